//! Embedded object store implementing the objstream storage port on fjall

use fjall::{Config, Keyspace, Partition, PartitionCreateOptions, PersistMode};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use objstream_core::*;

pub mod bucket;
pub mod storage;

pub use bucket::*;

/// Tunables for the embedded store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Objects up to this size are stored inline next to their metadata
    pub value_threshold: usize,
    /// Chunk size used to split larger single-shot objects
    pub chunk_size: usize,
    /// Smallest accepted size for every multipart part except the last
    pub min_part_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_threshold: 64 * 1024,
            chunk_size: 4 * 1024 * 1024,
            min_part_size: 5 * 1024 * 1024,
        }
    }
}

/// Storage engine wrapping a fjall keyspace; one partition per bucket.
///
/// The inherent and [`Bucket`] methods block on disk I/O. The
/// `ObjectStorage` impl moves every call onto Tokio's blocking pool and
/// must run inside a Tokio runtime.
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<Keyspace>,
    catalog: Arc<Partition>,
    config: EngineConfig,
    write_lock: Arc<Mutex<()>>,
}

impl StorageEngine {
    /// Open (or create) a storage engine at the given path
    pub fn new(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let keyspace = Config::new(path).open().map_err(storage_error)?;
        let catalog = keyspace
            .open_partition("catalog", PartitionCreateOptions::default())
            .map_err(storage_error)?;

        Ok(StorageEngine {
            keyspace: Arc::new(keyspace),
            catalog: Arc::new(catalog),
            config,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        Self::temp_with(EngineConfig::default())
    }

    /// Create temporary storage engine with a custom configuration
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp_with(config: EngineConfig) -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let engine = Self::new(temp_dir.path(), config)?;
        Ok((engine, temp_dir))
    }

    /// Register a bucket; creating an existing bucket is a no-op
    pub fn create_bucket(&self, name: &BucketName) -> Result<Bucket> {
        self.catalog
            .insert(name.as_str(), b"")
            .map_err(storage_error)?;
        let bucket = Bucket::open(self.clone(), name.clone())?;
        self.persist()?;
        Ok(bucket)
    }

    /// Open an existing bucket
    pub fn bucket(&self, name: &BucketName) -> Result<Bucket> {
        if !self.bucket_exists(name)? {
            return Err(StorageError::NoSuchBucket {
                bucket: name.to_string(),
            });
        }
        Bucket::open(self.clone(), name.clone())
    }

    pub fn bucket_exists(&self, name: &BucketName) -> Result<bool> {
        self.catalog
            .contains_key(name.as_str())
            .map_err(storage_error)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the underlying keyspace
    pub(crate) fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Serializes read-modify-write sequences on upload records
    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)
    }
}

pub(crate) fn storage_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Service(e.to_string())
}
