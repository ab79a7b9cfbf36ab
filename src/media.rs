use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::error::StudioError;

pub const MEDIA_PREFIX: &str = "pinn-clip-";

/// Directory where downloaded clips live for the current session.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes downloaded bytes to a fresh session file.
    pub fn materialize(&self, bytes: &[u8]) -> Result<VideoHandle, StudioError> {
        self.write_clip(bytes)
            .map_err(|e| StudioError::Remote(format!("Failed to store video file: {e:#}")))
    }

    fn write_clip(&self, bytes: &[u8]) -> Result<VideoHandle> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create dir {}", self.dir.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix(MEDIA_PREFIX)
            .suffix(".mp4")
            .tempfile_in(&self.dir)
            .context("Failed to create media file")?;
        file.write_all(bytes).context("Failed to write media file")?;
        file.flush().context("Failed to flush media file")?;

        Ok(VideoHandle {
            path: file.into_temp_path(),
            size: bytes.len() as u64,
        })
    }
}

/// A rendered clip on local disk. The file is deleted when the handle is
/// dropped, so a job that is re-rendered or removed releases its video.
pub struct VideoHandle {
    path: TempPath,
    size: u64,
}

impl VideoHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copies the clip to `dest`, creating parent directories.
    pub fn export<P: AsRef<Path>>(&self, dest: P) -> Result<PathBuf> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create dir {}", parent.display()))?;
            }
        }
        std::fs::copy(self.path(), dest)
            .with_context(|| format!("Failed to export video to {}", dest.display()))?;
        Ok(dest.to_path_buf())
    }
}

impl fmt::Debug for VideoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoHandle")
            .field("path", &self.path())
            .field("size", &self.size)
            .finish()
    }
}

/// File name used when a scene's video is downloaded.
pub fn export_file_name(scene_number: usize) -> String {
    format!("scene_{}.mp4", scene_number)
}
