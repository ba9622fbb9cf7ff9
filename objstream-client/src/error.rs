//! Client error types

use objstream_core::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error produced by a caller-supplied chunk stream
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Chunk source failed: {0}")]
    ChunkSource(#[source] BoxError),

    #[error("Multipart upload needs at least one non-empty chunk")]
    EmptyUpload,

    #[error("Multipart upload aborted before completion")]
    UploadAborted,

    /// A background upload failure, reported again on every later call
    #[error(transparent)]
    UploadFailed(Arc<ClientError>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// The storage service error behind this failure, if any
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            ClientError::Storage(e) => Some(e),
            ClientError::UploadFailed(cause) => cause.storage(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.storage().is_some_and(StorageError::is_not_found)
    }
}
