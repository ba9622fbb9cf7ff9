//! Streaming I/O support

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, TryStreamExt};
use objstream_core::{ByteStream, CompletionResponse, GetObjectOutput};
use pin_project::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{ClientError, Result};

/// Streaming GET response
#[pin_project]
pub struct ObjectBody {
    #[pin]
    inner: ByteStream,
    content_length: Option<u64>,
    content_type: Option<String>,
    e_tag: Option<String>,
}

impl ObjectBody {
    pub(crate) fn new(output: GetObjectOutput) -> Self {
        ObjectBody {
            inner: output.body,
            content_length: output.content_length,
            content_type: output.content_type,
            e_tag: output.e_tag,
        }
    }

    /// Length announced by the service, if any
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// Read the remaining body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        let capacity = self
            .content_length
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);

        let buffer = self
            .try_fold(BytesMut::with_capacity(capacity), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;

        Ok(buffer.freeze())
    }
}

impl Stream for ObjectBody {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.inner
            .poll_next(cx)
            .map(|item| item.map(|chunk| chunk.map_err(ClientError::from)))
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("e_tag", &self.e_tag)
            .finish_non_exhaustive()
    }
}

pub(crate) enum SinkMessage {
    Chunk(Bytes),
    Finish,
}

/// Turn sink messages into chunks.
///
/// `cancel` is checked before every message, so a cancelled or dropped sink
/// ends the stream with `UploadAborted` without draining buffered chunks. A
/// channel that closes without `Finish` ends it the same way.
pub(crate) fn sink_chunks(
    receiver: mpsc::Receiver<SinkMessage>,
    cancel: oneshot::Receiver<()>,
) -> impl Stream<Item = Result<Bytes>> + Send {
    stream::unfold(Some((receiver, cancel)), |state| async move {
        let (mut receiver, mut cancel) = state?;
        tokio::select! {
            biased;
            _ = &mut cancel => Some((Err(ClientError::UploadAborted), None)),
            message = receiver.recv() => match message {
                Some(SinkMessage::Chunk(chunk)) => Some((Ok(chunk), Some((receiver, cancel)))),
                Some(SinkMessage::Finish) => None,
                None => Some((Err(ClientError::UploadAborted), None)),
            },
        }
    })
}

/// Push side of a multipart upload.
///
/// Chunks go through a bounded channel to a background task that owns the
/// upload session, so `send_chunk` waits whenever the task falls behind.
/// Dropping the sink without calling [`complete`](Self::complete) aborts
/// the upload. Once the background upload has failed, every later call
/// reports that failure as [`ClientError::UploadFailed`].
pub struct UploadSink {
    sender: Option<mpsc::Sender<SinkMessage>>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<CompletionResponse>>>,
    failure: Option<Arc<ClientError>>,
    chunks_sent: usize,
}

impl UploadSink {
    pub(crate) fn new(
        sender: mpsc::Sender<SinkMessage>,
        cancel: oneshot::Sender<()>,
        task: JoinHandle<Result<CompletionResponse>>,
    ) -> Self {
        UploadSink {
            sender: Some(sender),
            cancel: Some(cancel),
            task: Some(task),
            failure: None,
            chunks_sent: 0,
        }
    }

    /// Send a chunk
    pub async fn send_chunk(&mut self, data: Bytes) -> Result<()> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(self.terminal_error());
        };

        if sender.send(SinkMessage::Chunk(data)).await.is_err() {
            // The task stopped reading, so it has already failed
            self.sender = None;
            let cause = match self.join().await {
                Err(ClientError::UploadFailed(cause)) => cause,
                Err(e) => Arc::new(e),
                Ok(_) => Arc::new(ClientError::Internal(
                    "upload finished before end of input".to_string(),
                )),
            };
            self.failure = Some(cause);
            return Err(self.terminal_error());
        }

        self.chunks_sent += 1;
        Ok(())
    }

    /// Signal end of input and wait for the upload to complete
    pub async fn complete(mut self) -> Result<CompletionResponse> {
        if let Some(sender) = self.sender.take() {
            // A failed send means the task already ended; its outcome is reported below
            let _ = sender.send(SinkMessage::Finish).await;
        }
        debug!("Upload sink closed after {} chunks", self.chunks_sent);
        self.join().await
    }

    /// Cancel the upload; chunks still buffered are discarded and the session
    /// is aborted on the service
    pub async fn abort(mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            // The task may already be gone; `join` reports how it ended
            let _ = cancel.send(());
        }
        self.sender = None;
        match self.join().await {
            Err(ClientError::UploadAborted) => Ok(()),
            Err(e) => Err(e),
            Ok(_) => Err(ClientError::Internal("upload completed before abort".to_string())),
        }
    }

    /// Number of chunks accepted so far
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    fn terminal_error(&self) -> ClientError {
        match &self.failure {
            Some(cause) => ClientError::UploadFailed(cause.clone()),
            None => ClientError::UploadAborted,
        }
    }

    async fn join(&mut self) -> Result<CompletionResponse> {
        if self.failure.is_some() {
            return Err(self.terminal_error());
        }
        let task = self.task.take().ok_or(ClientError::UploadAborted)?;
        task.await
            .map_err(|e| ClientError::Internal(format!("upload task failed: {}", e)))?
    }
}
