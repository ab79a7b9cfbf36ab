use anyhow::Result;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

use crate::config::Config;
use crate::media::MEDIA_PREFIX;
use crate::{logi, logw};

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.media_dir, &cfg.export_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Deletes clips left behind by an earlier session. Videos only live as
/// long as the session that rendered them.
pub fn purge_stale_media<P: AsRef<Path>>(media_dir: P) -> usize {
    let media_dir = media_dir.as_ref();
    if !media_dir.is_dir() {
        return 0;
    }

    let mut removed = 0;
    for entry in WalkDir::new(media_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_clip = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(MEDIA_PREFIX))
            .unwrap_or(false);
        if !is_clip {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => logw(format!(
                "Could not remove stale clip {}: {}",
                entry.path().display(),
                e
            )),
        }
    }

    if removed > 0 {
        logi(format!("Removed {} stale clips from {}", removed, media_dir.display()));
    }
    removed
}
