//! The storage-service port every backend implements

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::*;

/// Streamed body of a downloaded object
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response of a get request, before the body is consumed
pub struct GetObjectOutput {
    pub body: ByteStream,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub e_tag: Option<String>,
}

impl std::fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("e_tag", &self.e_tag)
            .finish_non_exhaustive()
    }
}

/// Operations of an S3-compatible object-storage service.
///
/// Implementations translate their vendor request and response types into
/// the crate's own types, so callers never see SDK classes. Every method is
/// a single request; retries, if any, belong to the implementation's client.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store a fully available buffer under `request.key`
    async fn put_object(&self, request: UploadRequest) -> Result<PutResponse>;

    /// Open the body of an object for streaming
    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<GetObjectOutput>;

    /// Start a multipart upload and return its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// Upload one part of an open multipart upload
    async fn upload_part(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<PartResult>;

    /// Finalize a multipart upload from its ordered part manifest
    async fn complete_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartResult],
    ) -> Result<CompletionResponse>;

    /// Discard a multipart upload and every part stored for it
    async fn abort_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
    ) -> Result<()>;

    /// Uploads that were initiated but neither completed nor aborted
    async fn list_multipart_uploads(&self, bucket: &BucketName) -> Result<Vec<PendingUpload>>;

    async fn create_bucket(&self, bucket: &BucketName) -> Result<()>;

    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool>;

    /// Remove an object; removing a missing key is not an error
    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<()>;
}
