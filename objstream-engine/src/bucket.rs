//! Bucket abstraction over fjall partitions

use bytes::Bytes;
use fjall::{Partition, PartitionCreateOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use objstream_core::*;
use crate::{storage_error, StorageEngine};

/// S3 caps part numbers at 10 000
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Where the bytes of an object live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectLayout {
    /// Stored next to the metadata under `data:<key>`
    Inline,
    /// Stored as an ordered list of blobs
    Chunked { blobs: Vec<String> },
}

/// Object metadata stored under `meta:<key>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub e_tag: String,
    pub content_type: Option<String>,
    pub created_at: SystemTime,
    pub layout: ObjectLayout,
}

impl ObjectMetadata {
    /// Check if this object is stored as chunks
    pub fn is_chunked(&self) -> bool {
        matches!(self.layout, ObjectLayout::Chunked { .. })
    }

    fn blobs(&self) -> &[String] {
        match &self.layout {
            ObjectLayout::Inline => &[],
            ObjectLayout::Chunked { blobs } => blobs,
        }
    }
}

/// An open multipart upload, stored under `upload:<upload_id>`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UploadRecord {
    key: ObjectKey,
    content_type: Option<String>,
    initiated: SystemTime,
    parts: BTreeMap<u32, StoredPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPart {
    blob: String,
    size: u64,
    e_tag: String,
}

/// Bucket backed by its own fjall partition
#[derive(Clone)]
pub struct Bucket {
    name: BucketName,
    partition: Arc<Partition>,
    engine: StorageEngine,
}

impl Bucket {
    /// Open the partition of a bucket known to the catalog
    pub(crate) fn open(engine: StorageEngine, name: BucketName) -> Result<Self> {
        // fjall partition names do not allow dots; '#' never appears in a bucket name
        let partition_name = format!("bucket_{}", name.as_str().replace('.', "#"));

        let partition = Arc::new(
            engine
                .keyspace()
                .open_partition(&partition_name, PartitionCreateOptions::default())
                .map_err(storage_error)?,
        );

        Ok(Bucket {
            name,
            partition,
            engine,
        })
    }

    pub fn name(&self) -> &BucketName {
        &self.name
    }

    /// Store an object, replacing any previous version
    pub fn put(&self, key: &ObjectKey, data: &[u8], content_type: Option<&str>) -> Result<ObjectMetadata> {
        let _guard = self.engine.write_guard();
        let config = self.engine.config();

        let layout = if data.len() <= config.value_threshold {
            ObjectLayout::Inline
        } else {
            let prefix = ulid::Ulid::new().to_string();
            let mut blobs = Vec::new();
            for (i, chunk) in data.chunks(config.chunk_size.max(1)).enumerate() {
                let blob = format!("{}:{:05}", prefix, i);
                self.write(&blob_key(&blob), chunk)?;
                blobs.push(blob);
            }
            ObjectLayout::Chunked { blobs }
        };

        self.remove_object(key)?;
        if layout == ObjectLayout::Inline {
            self.write(&data_key(key), data)?;
        }

        let metadata = ObjectMetadata {
            size: data.len() as u64,
            e_tag: content_hash(data),
            content_type: content_type.map(str::to_string),
            created_at: SystemTime::now(),
            layout,
        };
        self.write(&meta_key(key), serde_json::to_vec(&metadata)?)?;

        self.engine.persist()?;
        Ok(metadata)
    }

    /// Get object metadata
    pub fn get_metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMetadata>> {
        match self.read(&meta_key(key))? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Read the bytes of an inline object
    pub fn get_inline(&self, key: &ObjectKey) -> Result<Option<Bytes>> {
        self.read(&data_key(key))
    }

    /// Read one blob of a chunked object
    pub fn read_blob(&self, blob: &str) -> Result<Bytes> {
        self.read(&blob_key(blob))?
            .ok_or_else(|| StorageError::Service(format!("Missing blob: {}", blob)))
    }

    /// Read a whole object into memory
    pub fn get(&self, key: &ObjectKey) -> Result<Option<Vec<u8>>> {
        let metadata = match self.get_metadata(key)? {
            Some(metadata) => metadata,
            None => return Ok(None),
        };

        if !metadata.is_chunked() {
            return Ok(self.get_inline(key)?.map(|data| data.to_vec()));
        }

        let mut data = Vec::with_capacity(metadata.size as usize);
        for blob in metadata.blobs() {
            data.extend_from_slice(&self.read_blob(blob)?);
        }
        Ok(Some(data))
    }

    /// Delete object
    pub fn delete(&self, key: &ObjectKey) -> Result<()> {
        let _guard = self.engine.write_guard();
        self.remove_object(key)?;
        self.engine.persist()
    }

    /// Start a multipart upload and return its id
    pub fn create_upload(&self, key: &ObjectKey, content_type: Option<&str>) -> Result<String> {
        let upload_id = ulid::Ulid::new().to_string();
        let record = UploadRecord {
            key: key.clone(),
            content_type: content_type.map(str::to_string),
            initiated: SystemTime::now(),
            parts: BTreeMap::new(),
        };

        let _guard = self.engine.write_guard();
        self.store_upload(&upload_id, &record)?;
        self.engine.persist()?;
        Ok(upload_id)
    }

    /// Store one part; uploading the same part number again replaces it
    pub fn put_part(
        &self,
        upload_id: &str,
        key: &ObjectKey,
        part_number: u32,
        data: &[u8],
    ) -> Result<PartResult> {
        if part_number == 0 || part_number > MAX_PART_NUMBER {
            return Err(StorageError::InvalidRequest(format!(
                "part number {} outside 1..={}",
                part_number, MAX_PART_NUMBER
            )));
        }

        let _guard = self.engine.write_guard();
        let mut record = self.load_upload(upload_id, key)?;

        let blob = format!("{}:{:05}", upload_id, part_number);
        let e_tag = content_hash(data);
        self.write(&blob_key(&blob), data)?;

        record.parts.insert(
            part_number,
            StoredPart {
                blob,
                size: data.len() as u64,
                e_tag: e_tag.clone(),
            },
        );
        self.store_upload(upload_id, &record)?;
        self.engine.persist()?;

        Ok(PartResult {
            part_number,
            e_tag,
            size: data.len() as u64,
        })
    }

    /// Assemble the listed parts into the object at `key`
    pub fn complete_upload(
        &self,
        upload_id: &str,
        key: &ObjectKey,
        manifest: &[PartResult],
    ) -> Result<ObjectMetadata> {
        let _guard = self.engine.write_guard();
        let mut record = self.load_upload(upload_id, key)?;

        if manifest.is_empty() {
            return Err(StorageError::InvalidRequest(
                "at least one part must be specified".to_string(),
            ));
        }

        let min_part_size = self.engine.config().min_part_size as u64;
        let mut blobs = Vec::with_capacity(manifest.len());
        let mut size = 0u64;
        let mut previous = 0u32;

        for (i, entry) in manifest.iter().enumerate() {
            if entry.part_number <= previous {
                return Err(StorageError::InvalidRequest(format!(
                    "part {} listed after part {}; parts must be in ascending order",
                    entry.part_number, previous
                )));
            }
            previous = entry.part_number;

            let stored = record.parts.remove(&entry.part_number).ok_or_else(|| {
                StorageError::InvalidRequest(format!("part {} was never uploaded", entry.part_number))
            })?;
            if stored.e_tag != entry.e_tag {
                return Err(StorageError::InvalidRequest(format!(
                    "ETag mismatch for part {}",
                    entry.part_number
                )));
            }
            if i + 1 < manifest.len() && stored.size < min_part_size {
                return Err(StorageError::InvalidRequest(format!(
                    "part {} is {} bytes, smaller than the minimum of {}",
                    entry.part_number, stored.size, min_part_size
                )));
            }

            size += stored.size;
            blobs.push(stored.blob);
        }

        // Parts uploaded but not listed are discarded
        for unused in record.parts.values() {
            self.erase(&blob_key(&unused.blob))?;
        }

        let mut hasher = blake3::Hasher::new();
        for entry in manifest {
            hasher.update(entry.e_tag.as_bytes());
        }

        self.remove_object(key)?;
        let metadata = ObjectMetadata {
            size,
            e_tag: format!("{}-{}", hasher.finalize().to_hex(), manifest.len()),
            content_type: record.content_type,
            created_at: SystemTime::now(),
            layout: ObjectLayout::Chunked { blobs },
        };
        self.write(&meta_key(key), serde_json::to_vec(&metadata)?)?;
        self.erase(&upload_key(upload_id))?;

        self.engine.persist()?;
        Ok(metadata)
    }

    /// Drop an upload and all of its parts
    pub fn abort_upload(&self, upload_id: &str, key: &ObjectKey) -> Result<()> {
        let _guard = self.engine.write_guard();
        let record = self.load_upload(upload_id, key)?;

        for part in record.parts.values() {
            self.erase(&blob_key(&part.blob))?;
        }
        self.erase(&upload_key(upload_id))?;

        self.engine.persist()
    }

    /// Uploads that are neither completed nor aborted
    pub fn list_uploads(&self) -> Result<Vec<PendingUpload>> {
        let prefix = b"upload:".to_vec();
        let mut uploads = Vec::new();

        for item in self.partition.range(prefix.clone()..) {
            let (key_bytes, value) = item.map_err(storage_error)?;
            if !key_bytes.starts_with(&prefix) {
                break;
            }

            let upload_id = String::from_utf8_lossy(&key_bytes[prefix.len()..]).into_owned();
            let record: UploadRecord = serde_json::from_slice(&value)?;
            uploads.push(PendingUpload {
                key: record.key,
                upload_id,
                initiated: Some(record.initiated),
            });
        }

        Ok(uploads)
    }

    fn load_upload(&self, upload_id: &str, key: &ObjectKey) -> Result<UploadRecord> {
        let record: Option<UploadRecord> = match self.read(&upload_key(upload_id))? {
            Some(data) => Some(serde_json::from_slice(&data)?),
            None => None,
        };

        match record {
            Some(record) if &record.key == key => Ok(record),
            _ => Err(StorageError::NoSuchUpload {
                upload_id: upload_id.to_string(),
            }),
        }
    }

    fn store_upload(&self, upload_id: &str, record: &UploadRecord) -> Result<()> {
        self.write(&upload_key(upload_id), serde_json::to_vec(record)?)
    }

    /// Remove metadata, inline data and blobs of an object, if present
    fn remove_object(&self, key: &ObjectKey) -> Result<()> {
        if let Some(metadata) = self.get_metadata(key)? {
            for blob in metadata.blobs() {
                self.erase(&blob_key(blob))?;
            }
            self.erase(&data_key(key))?;
            self.erase(&meta_key(key))?;
        }
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.partition
            .get(key)
            .map(|value| value.map(|v| Bytes::copy_from_slice(&v)))
            .map_err(storage_error)
    }

    fn write(&self, key: &[u8], value: impl AsRef<[u8]>) -> Result<()> {
        self.partition
            .insert(key, value.as_ref())
            .map_err(storage_error)
    }

    fn erase(&self, key: &[u8]) -> Result<()> {
        self.partition.remove(key).map_err(storage_error)
    }
}

/// BLAKE3 digest of `data`, hex encoded; used as the ETag
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// Helper methods for key formatting
fn meta_key(key: &ObjectKey) -> Vec<u8> {
    format!("meta:{}", key.as_str()).into_bytes()
}

fn data_key(key: &ObjectKey) -> Vec<u8> {
    format!("data:{}", key.as_str()).into_bytes()
}

fn blob_key(blob: &str) -> Vec<u8> {
    format!("blob:{}", blob).into_bytes()
}

fn upload_key(upload_id: &str) -> Vec<u8> {
    format!("upload:{}", upload_id).into_bytes()
}
