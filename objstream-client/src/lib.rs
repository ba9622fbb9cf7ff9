//! objstream client: an adapter over S3-compatible object storage
//!
//! [`ObjectStreamClient`] puts whole buffers, streams objects back, and runs
//! multipart uploads from a chunk stream or a push-based [`UploadSink`]. Any
//! backend implementing `objstream_core::ObjectStorage` can sit underneath.

pub mod client;
pub mod config;
pub mod error;
pub mod multipart;
pub mod streaming;

pub use client::ObjectStreamClient;
pub use config::AdapterConfig;
pub use error::{BoxError, ClientError};
pub use multipart::MultipartUpload;
pub use streaming::{ObjectBody, UploadSink};

pub type Result<T> = std::result::Result<T, ClientError>;
