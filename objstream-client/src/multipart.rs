//! Multipart upload support

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use objstream_core::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{ClientError, Result};

/// An open multipart upload session.
///
/// Parts are numbered 1, 2, 3, ... in the order they are uploaded. The
/// session must end in [`complete`](Self::complete) or [`abort`](Self::abort);
/// dropping it while still open schedules an abort on the current Tokio
/// runtime so the service never keeps an orphaned upload.
pub struct MultipartUpload {
    storage: Arc<dyn ObjectStorage>,
    session: MultipartSession,
    finished: bool,
}

impl MultipartUpload {
    /// Initiate a new upload on the service
    pub async fn initiate(
        storage: Arc<dyn ObjectStorage>,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<Self> {
        let upload_id = storage
            .create_multipart_upload(bucket, key, content_type)
            .await?;
        debug!("Initiated multipart upload: bucket={}, key={}, upload_id={}", bucket, key, upload_id);

        Ok(MultipartUpload {
            storage,
            session: MultipartSession::new(bucket.clone(), key.clone(), upload_id),
            finished: false,
        })
    }

    /// Upload the next part
    pub async fn upload_part(&mut self, data: Bytes) -> Result<&PartResult> {
        let part_number = self.session.next_part_number();
        debug!(
            "Uploading part: upload_id={}, part_number={}, size={}",
            self.session.upload_id(),
            part_number,
            data.len()
        );

        let part = self
            .storage
            .upload_part(
                self.session.bucket(),
                self.session.key(),
                self.session.upload_id(),
                part_number,
                data,
            )
            .await?;
        self.session.record_part(part)?;

        Ok(&self.session.parts()[self.session.parts().len() - 1])
    }

    /// Complete the multipart upload; a failed completion aborts the session
    pub async fn complete(mut self) -> Result<CompletionResponse> {
        let result = self
            .storage
            .complete_multipart_upload(
                self.session.bucket(),
                self.session.key(),
                self.session.upload_id(),
                self.session.parts(),
            )
            .await;

        match result {
            Ok(response) => {
                self.finished = true;
                info!(
                    "Completed multipart upload: bucket={}, key={}, parts={}, size={}",
                    response.bucket, response.key, response.parts, response.size
                );
                Ok(response)
            }
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    /// Abort the multipart upload.
    ///
    /// The session stays armed until the abort request resolves, so dropping
    /// this future midway still leaves the abort to `Drop`.
    pub async fn abort(mut self) -> Result<()> {
        warn!(
            "Aborting multipart upload: bucket={}, key={}, upload_id={}",
            self.session.bucket(),
            self.session.key(),
            self.session.upload_id()
        );
        let result = self
            .storage
            .abort_multipart_upload(self.session.bucket(), self.session.key(), self.session.upload_id())
            .await;
        self.finished = true;
        Ok(result?)
    }

    /// Abort after `cause`, returning `cause`; abort failures are only logged
    pub(crate) async fn fail(self, cause: ClientError) -> ClientError {
        let upload_id = self.session.upload_id().to_string();
        warn!("Multipart upload {} failed: {}", upload_id, cause);
        if let Err(e) = self.abort().await {
            warn!("Abort of multipart upload {} failed: {}", upload_id, e);
        }
        cause
    }

    /// Get upload ID
    pub fn upload_id(&self) -> &str {
        self.session.upload_id()
    }

    /// Parts acknowledged so far
    pub fn parts(&self) -> &[PartResult] {
        self.session.parts()
    }
}

impl Drop for MultipartUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let storage = self.storage.clone();
        let bucket = self.session.bucket().clone();
        let key = self.session.key().clone();
        let upload_id = self.session.upload_id().to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Multipart upload {} dropped while open, aborting", upload_id);
                handle.spawn(async move {
                    if let Err(e) = storage.abort_multipart_upload(&bucket, &key, &upload_id).await {
                        warn!("Abort of multipart upload {} failed: {}", upload_id, e);
                    }
                });
            }
            Err(_) => warn!(
                "Multipart upload {} dropped outside a Tokio runtime and stays open",
                upload_id
            ),
        }
    }
}

/// Run a whole upload: initiate on the first chunk, one part per chunk, complete.
///
/// Nothing is sent to the service until the first non-empty chunk arrives, so
/// an empty input fails with [`ClientError::EmptyUpload`] without creating a
/// session. Any failure after initiation aborts the session before returning.
pub(crate) async fn upload_stream<S>(
    storage: Arc<dyn ObjectStorage>,
    bucket: BucketName,
    key: ObjectKey,
    content_type: Option<String>,
    chunks: S,
    part_size: Option<usize>,
) -> Result<CompletionResponse>
where
    S: Stream<Item = Result<Bytes>> + Send,
{
    let chunks = chunks.try_filter(|chunk| futures::future::ready(!chunk.is_empty()));
    let mut parts: BoxStream<'_, Result<Bytes>> = match part_size {
        Some(size) => coalesce(chunks.boxed(), size).boxed(),
        None => chunks.boxed(),
    };

    let first = match parts.try_next().await? {
        Some(chunk) => chunk,
        None => return Err(ClientError::EmptyUpload),
    };

    let mut upload = MultipartUpload::initiate(storage, &bucket, &key, content_type.as_deref()).await?;

    let mut next = Some(first);
    while let Some(chunk) = next {
        if let Err(e) = upload.upload_part(chunk).await.map(|_| ()) {
            return Err(upload.fail(e).await);
        }
        next = match parts.try_next().await {
            Ok(chunk) => chunk,
            Err(e) => return Err(upload.fail(e).await),
        };
    }

    upload.complete().await
}

/// Regroup chunks into parts of exactly `part_size` bytes; the last part keeps the remainder
fn coalesce<'a>(
    chunks: BoxStream<'a, Result<Bytes>>,
    part_size: usize,
) -> impl Stream<Item = Result<Bytes>> + Send + 'a {
    stream::unfold(
        (chunks, BytesMut::new(), false),
        move |(mut chunks, mut buffer, mut exhausted)| async move {
            loop {
                if buffer.len() >= part_size {
                    let part = buffer.split_to(part_size).freeze();
                    return Some((Ok(part), (chunks, buffer, exhausted)));
                }
                if exhausted {
                    if buffer.is_empty() {
                        return None;
                    }
                    let part = buffer.split().freeze();
                    return Some((Ok(part), (chunks, buffer, exhausted)));
                }

                match chunks.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(e), (chunks, buffer, true)));
                    }
                    None => exhausted = true,
                }
            }
        },
    )
}
