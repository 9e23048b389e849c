use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A one-shot read or subscription setup failed.
    #[error("store read failed: {0}")]
    ReadFailed(String),

    /// A subtree overwrite was not acknowledged.
    #[error("store write failed: {0}")]
    WriteFailed(String),

    /// A path segment was empty or used a reserved character.
    #[error("invalid tree path segment: {0:?}")]
    InvalidPath(String),

    /// Could not determine a platform data directory.
    #[error("could not determine application data directory")]
    NoDataDir,

    /// Blob upload failed.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Blob storage bookkeeping error (directory creation, read-back).
    #[error("blob storage error: {0}")]
    BlobStorage(String),

    /// Requested blob does not exist.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// Upload larger than the configured cap.
    #[error("blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    /// Empty upload payload.
    #[error("empty blob")]
    EmptyBlob,

    /// File name contained a separator or traversal sequence.
    #[error("invalid blob file name: {0:?}")]
    InvalidFileName(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
