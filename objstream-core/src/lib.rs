//! Core data model, error taxonomy and storage port for objstream

pub mod error;
pub mod storage;
pub mod types;

pub use error::*;
pub use storage::*;
pub use types::*;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
