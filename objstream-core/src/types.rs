//! Core data types for objstream

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::StorageError;

/// Bucket name following S3 naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Create a new bucket name with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.len() < 3 || name.len() > 63 {
            return Err(StorageError::InvalidBucketName(format!(
                "'{}' must be between 3 and 63 characters",
                name
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(StorageError::InvalidBucketName(format!(
                "invalid characters in '{}'",
                name
            )));
        }

        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(StorageError::InvalidBucketName(format!(
                "'{}' must start and end with a letter or digit",
                name
            )));
        }

        Ok(BucketName(name.to_string()))
    }

    /// Get the bucket name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BucketName {
    type Err = StorageError;

    fn from_str(s: &str) -> crate::Result<Self> {
        BucketName::new(s)
    }
}

/// Maximum key length accepted by S3-compatible services
pub const MAX_KEY_LEN: usize = 1024;

/// Object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        if key.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key is {} bytes, limit is {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(StorageError::InvalidKey(
                "control characters not allowed".to_string(),
            ));
        }

        Ok(ObjectKey(key.to_string()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = StorageError;

    fn from_str(s: &str) -> crate::Result<Self> {
        ObjectKey::new(s)
    }
}

/// Single-shot upload of a fully available buffer
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bucket: BucketName,
    pub key: ObjectKey,
    pub content: Bytes,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

impl UploadRequest {
    pub fn new(bucket: BucketName, key: ObjectKey, content: impl Into<Bytes>) -> Self {
        UploadRequest {
            bucket,
            key,
            content: content.into(),
            content_length: None,
            content_type: None,
        }
    }

    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Length sent to the service: the explicit one, or the buffer size.
    ///
    /// An explicit length that disagrees with the buffer is rejected.
    pub fn resolved_content_length(&self) -> crate::Result<u64> {
        let actual = self.content.len() as u64;
        match self.content_length {
            None => Ok(actual),
            Some(declared) if declared == actual => Ok(actual),
            Some(declared) => Err(StorageError::InvalidRequest(format!(
                "content length {} does not match buffer of {} bytes",
                declared, actual
            ))),
        }
    }
}

/// Acknowledgment of a single-shot put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResponse {
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}

/// Acknowledgment of one uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    pub part_number: u32,
    pub e_tag: String,
    pub size: u64,
}

/// Result of a completed multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub bucket: BucketName,
    pub key: ObjectKey,
    pub e_tag: Option<String>,
    pub location: Option<String>,
    pub version_id: Option<String>,
    pub parts: u32,
    pub size: u64,
}

/// An upload session that has been initiated but neither completed nor aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub key: ObjectKey,
    pub upload_id: String,
    pub initiated: Option<SystemTime>,
}

/// Client-side state of one multipart upload
#[derive(Debug, Clone)]
pub struct MultipartSession {
    bucket: BucketName,
    key: ObjectKey,
    upload_id: String,
    parts: Vec<PartResult>,
}

impl MultipartSession {
    pub fn new(bucket: BucketName, key: ObjectKey, upload_id: impl Into<String>) -> Self {
        MultipartSession {
            bucket,
            key,
            upload_id: upload_id.into(),
            parts: Vec::new(),
        }
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Part number the next uploaded chunk must carry
    pub fn next_part_number(&self) -> u32 {
        self.parts.len() as u32 + 1
    }

    /// Record an acknowledged part; part numbers must arrive as 1, 2, 3, ...
    pub fn record_part(&mut self, part: PartResult) -> crate::Result<()> {
        let expected = self.next_part_number();
        if part.part_number != expected {
            return Err(StorageError::InvalidRequest(format!(
                "part {} acknowledged out of order, expected {}",
                part.part_number, expected
            )));
        }
        self.parts.push(part);
        Ok(())
    }

    /// Acknowledged parts in ascending part-number order
    pub fn parts(&self) -> &[PartResult] {
        &self.parts
    }

    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
