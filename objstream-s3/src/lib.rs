//! S3 backend for objstream
//!
//! Implements the `ObjectStorage` port with the AWS SDK. Works against AWS
//! and against S3-compatible services such as MinIO (set `endpoint_url` and
//! `force_path_style`). SDK request and response types stay inside this crate.

pub mod client;
pub mod config;
mod error;

pub use client::S3Storage;
pub use config::S3Config;
