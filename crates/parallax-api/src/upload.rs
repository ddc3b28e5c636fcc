//! Uploaded image persistence.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use parallax_models::RawImage;

/// Writes uploaded images under a single directory, one fresh name per upload.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist the image as `temp_<uuid>.jpg` and return its path.
    ///
    /// The stored name ignores the client's file name, so concurrent uploads
    /// never collide.
    pub async fn save(&self, image: &RawImage) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("temp_{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&path, &image.bytes).await?;
        debug!("Stored upload ({} bytes) at {}", image.bytes.len(), path.display());
        Ok(path)
    }

    /// Best-effort removal of an upload that will never be rendered.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!("Failed to remove upload {}: {}", path.display(), e);
        }
    }
}
