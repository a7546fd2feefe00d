use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;

const LOGO_DIR: &str = "logos";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Only image files are allowed")]
    UnsupportedType(String),

    #[error("File exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file written under the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
}

/// Files on local disk, served back under `public_prefix`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.dir),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_bytes: config.max_file_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save_logo(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::MissingFile);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge(self.max_bytes));
        }
        let content_type = content_type.unwrap_or_default();
        let ext = image_extension(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

        let dir = self.root.join(LOGO_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&filename), bytes).await?;
        tracing::info!(file = %filename, size = bytes.len(), "Stored logo");

        Ok(StoredFile {
            url: format!("{}/{}/{}", self.public_prefix, LOGO_DIR, filename),
            filename,
        })
    }

    /// Deletes a previously stored logo. A missing file is not an error.
    pub async fn remove_logo(&self, filename: &str) {
        if filename.contains('/') || filename.contains('\\') || filename.starts_with('.') {
            tracing::warn!(file = filename, "Refusing to delete suspicious logo filename");
            return;
        }
        match tokio::fs::remove_file(self.root.join(LOGO_DIR).join(filename)).await {
            Ok(()) => tracing::debug!(file = filename, "Removed old logo"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = filename, "Failed to remove old logo: {}", e),
        }
    }
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max: usize) -> UploadStore {
        let dir = std::env::temp_dir().join(format!("erp-api-uploads-{}", Uuid::new_v4()));
        UploadStore::new(&UploadConfig {
            dir: dir.to_string_lossy().into_owned(),
            public_prefix: "/uploads/".to_string(),
            max_file_bytes: max,
        })
    }

    #[tokio::test]
    async fn logo_is_written_and_replaced() {
        let store = store(1024);
        let first = store.save_logo(Some("image/png"), b"png-bytes").await.unwrap();
        assert!(first.filename.ends_with(".png"));
        assert_eq!(first.url, format!("/uploads/logos/{}", first.filename));
        let path = store.root().join("logos").join(&first.filename);
        assert!(path.exists());

        store.remove_logo(&first.filename).await;
        assert!(!path.exists());
        // Second removal is quiet
        store.remove_logo(&first.filename).await;
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn rejects_non_images_and_oversize() {
        let store = store(4);
        assert!(matches!(
            store.save_logo(Some("application/pdf"), b"%PDF").await,
            Err(UploadError::UnsupportedType(_))
        ));
        assert!(matches!(
            store.save_logo(Some("image/png"), b"too-large").await,
            Err(UploadError::TooLarge(4))
        ));
        assert!(matches!(store.save_logo(Some("image/png"), b"").await, Err(UploadError::MissingFile)));
    }
}
