//! Error types shared by every storage backend

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Access denied: {0}")]
    Unauthorized(String),

    #[error("Bucket not found: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("Object not found: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("Multipart upload not found: {upload_id}")]
    NoSuchUpload { upload_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`StorageError`], independent of the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Transport,
    Auth,
    NotFound,
    InvalidRequest,
    ServiceInternal,
}

impl StorageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::Transport(_) | StorageError::Io(_) => ErrorCategory::Transport,
            StorageError::Unauthorized(_) => ErrorCategory::Auth,
            StorageError::NoSuchBucket { .. }
            | StorageError::NoSuchKey { .. }
            | StorageError::NoSuchUpload { .. } => ErrorCategory::NotFound,
            StorageError::InvalidRequest(_)
            | StorageError::InvalidBucketName(_)
            | StorageError::InvalidKey(_) => ErrorCategory::InvalidRequest,
            StorageError::Service(_) | StorageError::Serialization(_) => {
                ErrorCategory::ServiceInternal
            }
        }
    }

    /// Returns true if the bucket, key or upload does not exist
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}
