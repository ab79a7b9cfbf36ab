use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Program the desktop uses to open files with their default handler.
fn opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Opens a clip in the system video player, or a folder in the file browser.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        anyhow::bail!("nothing to open");
    }
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }

    Command::new(opener())
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to launch {} for {}", opener(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_missing_paths_without_spawning() {
        assert!(open_path("").is_err());
        assert!(open_path("/definitely/not/here.mp4").is_err());
    }
}
