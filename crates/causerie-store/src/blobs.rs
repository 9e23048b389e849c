//! File-backed blob store for profile pictures and photo messages.
//!
//! Stands in for the hosted object storage the mobile client used: named
//! uploads under an `images/` prefix resolving to a durable URL. Single
//! attempt, no retry or multipart; a failed upload surfaces once and is
//! not retried here.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info};

use causerie_shared::keys::{MessageId, UserKey};

use crate::error::{Result, StoreError};

/// Default cap on a single upload (8 MiB).
pub const DEFAULT_MAX_BLOB_SIZE: usize = 8 * 1024 * 1024;

/// File name under which a user's profile picture is uploaded.
pub fn profile_picture_name(user: &UserKey) -> String {
    format!("{user}_profile_picture.png")
}

/// File name under which a photo sent in a conversation is uploaded.
pub fn photo_message_name(message: &MessageId) -> String {
    format!("photo_message_{message}.png")
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    /// Open (or create) a blob store rooted at `base_path`.
    pub async fn open(base_path: PathBuf, max_size: usize) -> Result<Self> {
        let images = base_path.join("images");
        fs::create_dir_all(&images).await.map_err(|e| {
            StoreError::BlobStorage(format!(
                "failed to create blob directory '{}': {e}",
                images.display()
            ))
        })?;

        info!(path = %base_path.display(), "blob store ready");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Open the store in the platform-appropriate data directory.
    pub async fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("org", "causerie", "causerie")
            .ok_or(StoreError::NoDataDir)?;
        Self::open(dirs.data_dir().join("blobs"), DEFAULT_MAX_BLOB_SIZE).await
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// Upload `data` under `images/<file_name>` and return a retrievable
    /// URL for it.
    pub async fn upload(&self, data: Bytes, file_name: &str) -> Result<String> {
        if data.is_empty() {
            return Err(StoreError::EmptyBlob);
        }
        if data.len() > self.max_size {
            return Err(StoreError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.image_path(file_name)?;
        fs::write(&path, &data).await.map_err(|e| {
            StoreError::UploadFailed(format!("failed to write blob '{file_name}': {e}"))
        })?;

        debug!(file = file_name, size = data.len(), "stored blob");
        self.resolve_url(file_name).await
    }

    /// Resolve the durable URL of an already-uploaded file.
    pub async fn resolve_url(&self, file_name: &str) -> Result<String> {
        let path = self.image_path(file_name)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(format!("file://{}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(file_name.to_string()))
            }
            Err(e) => Err(StoreError::BlobStorage(format!(
                "failed to stat blob '{file_name}': {e}"
            ))),
        }
    }

    /// Read a blob back, e.g. to render a downloaded picture.
    pub async fn fetch(&self, file_name: &str) -> Result<Bytes> {
        let path = self.image_path(file_name)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(file = file_name, size = data.len(), "retrieved blob");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(file_name.to_string()))
            }
            Err(e) => Err(StoreError::BlobStorage(format!(
                "failed to read blob '{file_name}': {e}"
            ))),
        }
    }

    /// Reject names that would escape the `images/` directory.
    fn image_path(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(StoreError::InvalidFileName(file_name.to_string()));
        }
        Ok(self.base_path.join("images").join(file_name))
    }
}
