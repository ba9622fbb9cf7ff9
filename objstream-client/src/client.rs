//! Main client implementation

use bytes::Bytes;
use futures::stream::{Stream, TryStreamExt};
use objstream_core::*;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::multipart::upload_stream;
use crate::streaming::{sink_chunks, SinkMessage};
use crate::{AdapterConfig, BoxError, ClientError, MultipartUpload, ObjectBody, Result, UploadSink};

/// Object storage adapter.
///
/// Wraps any [`ObjectStorage`] backend and exposes whole-buffer puts,
/// streamed gets and multipart uploads fed from a stream or a sink. The
/// client is cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct ObjectStreamClient {
    storage: Arc<dyn ObjectStorage>,
    config: AdapterConfig,
}

impl ObjectStreamClient {
    /// Create new client
    pub fn new(storage: impl ObjectStorage + 'static) -> Self {
        Self::from_shared(Arc::new(storage))
    }

    pub fn from_shared(storage: Arc<dyn ObjectStorage>) -> Self {
        ObjectStreamClient {
            storage,
            config: AdapterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Store an object from a fully available buffer
    pub async fn put_object(&self, request: UploadRequest) -> Result<PutResponse> {
        debug!(
            "Put object: bucket={}, key={}, size={}",
            request.bucket,
            request.key,
            request.content.len()
        );
        Ok(self.storage.put_object(request).await?)
    }

    /// Store `content` with a derived length and the service's default content type
    pub async fn put_bytes(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content: impl Into<Bytes>,
    ) -> Result<PutResponse> {
        self.put_object(UploadRequest::new(bucket.clone(), key.clone(), content))
            .await
    }

    /// Retrieve an object into memory
    pub async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<Bytes> {
        self.get_object_stream(bucket, key).await?.bytes().await
    }

    /// Open an object for streaming
    pub async fn get_object_stream(&self, bucket: &BucketName, key: &ObjectKey) -> Result<ObjectBody> {
        debug!("Get object: bucket={}, key={}", bucket, key);
        let output = self.storage.get_object(bucket, key).await?;
        Ok(ObjectBody::new(output))
    }

    /// Start a multipart upload driven part by part by the caller
    pub async fn start_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<MultipartUpload> {
        MultipartUpload::initiate(self.storage.clone(), bucket, key, content_type).await
    }

    /// Upload `chunks` as one object through a multipart session.
    ///
    /// Each chunk becomes one part, in order, unless
    /// [`AdapterConfig::part_size`] regroups them. The session is aborted if a
    /// part, the stream or completion fails, and also if the returned future
    /// is dropped before it resolves. Zero-length chunks are skipped; a stream
    /// with no data fails with [`ClientError::EmptyUpload`] before any request.
    pub async fn multipart_upload<S, E>(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        chunks: S,
        content_type: Option<&str>,
    ) -> Result<CompletionResponse>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Into<BoxError>,
    {
        let chunks = chunks.map_err(|e| ClientError::ChunkSource(e.into()));
        upload_stream(
            self.storage.clone(),
            bucket.clone(),
            key.clone(),
            content_type.map(str::to_string),
            chunks,
            self.config.effective_part_size(),
        )
        .await
    }

    /// Multipart upload fed by pushing chunks into the returned sink.
    ///
    /// Must be called within a Tokio runtime; the upload runs on a spawned task.
    pub fn multipart_upload_consumer(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> UploadSink {
        let (sender, receiver) = mpsc::channel::<SinkMessage>(self.config.sink_capacity.max(1));
        let (cancel, cancelled) = oneshot::channel();

        let task = tokio::spawn(upload_stream(
            self.storage.clone(),
            bucket.clone(),
            key.clone(),
            content_type.map(str::to_string),
            sink_chunks(receiver, cancelled),
            self.config.effective_part_size(),
        ));

        UploadSink::new(sender, cancel, task)
    }
}

impl std::fmt::Debug for ObjectStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStreamClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
