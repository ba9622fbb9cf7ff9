//! `ObjectStorage` implementation for the embedded engine

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use objstream_core::*;
use crate::{storage_error, ObjectLayout, StorageEngine};

/// Run a synchronous engine call on Tokio's blocking pool.
///
/// fjall reads and writes, the write lock and `persist` fsyncs all block,
/// so async callers never run them on an executor thread.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(storage_error)?
}

#[async_trait]
impl ObjectStorage for StorageEngine {
    async fn put_object(&self, request: UploadRequest) -> Result<PutResponse> {
        request.resolved_content_length()?;
        let engine = self.clone();
        let metadata = blocking(move || {
            let bucket = engine.bucket(&request.bucket)?;
            bucket.put(&request.key, &request.content, request.content_type.as_deref())
        })
        .await?;

        Ok(PutResponse {
            e_tag: Some(metadata.e_tag),
            version_id: None,
        })
    }

    async fn get_object(&self, bucket_name: &BucketName, key: &ObjectKey) -> Result<GetObjectOutput> {
        let engine = self.clone();
        let (bucket_name, key) = (bucket_name.clone(), key.clone());
        let (bucket, metadata, inline) = blocking(move || {
            let bucket = engine.bucket(&bucket_name)?;
            let metadata = bucket.get_metadata(&key)?.ok_or_else(|| StorageError::NoSuchKey {
                bucket: bucket_name.to_string(),
                key: key.to_string(),
            })?;
            let inline = match metadata.layout {
                ObjectLayout::Inline => Some(bucket.get_inline(&key)?.unwrap_or_default()),
                ObjectLayout::Chunked { .. } => None,
            };
            Ok((bucket, metadata, inline))
        })
        .await?;

        let size = metadata.size;
        let content_type = metadata.content_type;
        let e_tag = metadata.e_tag;

        // Chunked bodies are read lazily, one blob per poll
        let body = match (metadata.layout, inline) {
            (ObjectLayout::Chunked { blobs }, _) => stream::iter(blobs)
                .then(move |blob| {
                    let bucket = bucket.clone();
                    blocking(move || bucket.read_blob(&blob))
                })
                .boxed(),
            (ObjectLayout::Inline, data) => {
                let data = data.unwrap_or_default();
                stream::once(async move { Ok(data) }).boxed()
            }
        };

        Ok(GetObjectOutput {
            body,
            content_length: Some(size),
            content_type,
            e_tag: Some(e_tag),
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<String> {
        let engine = self.clone();
        let (bucket, key) = (bucket.clone(), key.clone());
        let content_type = content_type.map(str::to_string);
        blocking(move || engine.bucket(&bucket)?.create_upload(&key, content_type.as_deref())).await
    }

    async fn upload_part(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<PartResult> {
        let engine = self.clone();
        let (bucket, key, upload_id) = (bucket.clone(), key.clone(), upload_id.to_string());
        blocking(move || engine.bucket(&bucket)?.put_part(&upload_id, &key, part_number, &body)).await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartResult],
    ) -> Result<CompletionResponse> {
        let engine = self.clone();
        let (bucket_name, object_key) = (bucket.clone(), key.clone());
        let (upload_id, manifest) = (upload_id.to_string(), parts.to_vec());
        let metadata = blocking(move || {
            engine
                .bucket(&bucket_name)?
                .complete_upload(&upload_id, &object_key, &manifest)
        })
        .await?;

        Ok(CompletionResponse {
            bucket: bucket.clone(),
            key: key.clone(),
            e_tag: Some(metadata.e_tag),
            location: Some(format!("/{}/{}", bucket, key)),
            version_id: None,
            parts: parts.len() as u32,
            size: metadata.size,
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
    ) -> Result<()> {
        let engine = self.clone();
        let (bucket, key, upload_id) = (bucket.clone(), key.clone(), upload_id.to_string());
        blocking(move || engine.bucket(&bucket)?.abort_upload(&upload_id, &key)).await
    }

    async fn list_multipart_uploads(&self, bucket: &BucketName) -> Result<Vec<PendingUpload>> {
        let engine = self.clone();
        let bucket = bucket.clone();
        blocking(move || engine.bucket(&bucket)?.list_uploads()).await
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<()> {
        let engine = self.clone();
        let bucket = bucket.clone();
        blocking(move || StorageEngine::create_bucket(&engine, &bucket).map(|_| ())).await
    }

    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool> {
        let engine = self.clone();
        let bucket = bucket.clone();
        blocking(move || StorageEngine::bucket_exists(&engine, &bucket)).await
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<()> {
        let engine = self.clone();
        let (bucket, key) = (bucket.clone(), key.clone());
        blocking(move || engine.bucket(&bucket)?.delete(&key)).await
    }
}
