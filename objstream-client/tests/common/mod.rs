//! Shared fixtures for client integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use objstream_client::ObjectStreamClient;
use objstream_core::*;
use objstream_engine::{EngineConfig, StorageEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a `RUST_LOG`-filtered subscriber once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn bucket() -> BucketName {
    BucketName::new("test-bucket").unwrap()
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(name).unwrap()
}

/// Engine without a minimum part size, so small test parts are accepted
pub async fn engine() -> (StorageEngine, tempfile::TempDir) {
    init_tracing();
    let (engine, temp) = StorageEngine::temp_with(EngineConfig {
        min_part_size: 0,
        ..EngineConfig::default()
    })
    .unwrap();
    ObjectStorage::create_bucket(&engine, &bucket()).await.unwrap();
    (engine, temp)
}

pub async fn client() -> (ObjectStreamClient, tempfile::TempDir) {
    let (engine, temp) = engine().await;
    (ObjectStreamClient::new(engine), temp)
}

/// Wait until no multipart upload is open in `bucket`
pub async fn wait_for_no_uploads(storage: &dyn ObjectStorage, bucket: &BucketName) {
    for _ in 0..100 {
        if storage.list_multipart_uploads(bucket).await.unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("multipart uploads still open in {}", bucket);
}

pub fn chunk(fill: u8, len: usize) -> Bytes {
    Bytes::from(vec![fill; len])
}

/// Wraps a backend and fails selected requests
pub struct FaultyStorage {
    inner: Arc<dyn ObjectStorage>,
    fail_part: Option<u32>,
    fail_complete: bool,
    abort_delay: Option<Duration>,
    pub creates: AtomicUsize,
    pub parts: AtomicUsize,
    pub completes: AtomicUsize,
    pub aborts: AtomicUsize,
}

impl FaultyStorage {
    pub fn new(inner: impl ObjectStorage + 'static) -> Self {
        FaultyStorage {
            inner: Arc::new(inner),
            fail_part: None,
            fail_complete: false,
            abort_delay: None,
            creates: AtomicUsize::new(0),
            parts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    /// Reject the upload of part `part_number`
    pub fn failing_part(mut self, part_number: u32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    /// Hold every abort request for `delay` before forwarding it
    pub fn slow_abort(mut self, delay: Duration) -> Self {
        self.abort_delay = Some(delay);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Requests of any kind that touched multipart sessions
    pub fn multipart_requests(&self) -> usize {
        Self::count(&self.creates)
            + Self::count(&self.parts)
            + Self::count(&self.completes)
            + Self::count(&self.aborts)
    }
}

#[async_trait]
impl ObjectStorage for FaultyStorage {
    async fn put_object(&self, request: UploadRequest) -> Result<PutResponse> {
        self.inner.put_object(request).await
    }

    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<GetObjectOutput> {
        self.inner.get_object(bucket, key).await
    }

    async fn create_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_multipart_upload(bucket, key, content_type).await
    }

    async fn upload_part(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<PartResult> {
        self.parts.fetch_add(1, Ordering::SeqCst);
        if self.fail_part == Some(part_number) {
            return Err(StorageError::Transport(format!(
                "injected failure on part {}",
                part_number
            )));
        }
        self.inner
            .upload_part(bucket, key, upload_id, part_number, body)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartResult],
    ) -> Result<CompletionResponse> {
        self.completes.fetch_add(1, Ordering::SeqCst);
        if self.fail_complete {
            return Err(StorageError::Service("injected completion failure".to_string()));
        }
        self.inner
            .complete_multipart_upload(bucket, key, upload_id, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
    ) -> Result<()> {
        if let Some(delay) = self.abort_delay {
            tokio::time::sleep(delay).await;
        }
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_multipart_upload(bucket, key, upload_id).await
    }

    async fn list_multipart_uploads(&self, bucket: &BucketName) -> Result<Vec<PendingUpload>> {
        self.inner.list_multipart_uploads(bucket).await
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<()> {
        self.inner.create_bucket(bucket).await
    }

    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool> {
        self.inner.bucket_exists(bucket).await
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<()> {
        self.inner.delete_object(bucket, key).await
    }
}
