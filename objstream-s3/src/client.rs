//! `ObjectStorage` over the AWS SDK for S3

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::time::{Duration, SystemTime};
use objstream_core::*;

use crate::error::{from_sdk_error, RequestTarget};
use crate::S3Config;

/// S3-compatible storage backed by `aws_sdk_s3::Client`
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Build an SDK client from `config`
    pub async fn connect(config: S3Config) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                    .operation_timeout(Duration::from_secs(config.operation_timeout_secs))
                    .build(),
            );

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        match (config.access_key_id, config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    None,
                    None,
                    "objstream",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::InvalidRequest(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ))
            }
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self::from_client(Client::from_conf(s3_config)))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn region(&self) -> Option<&str> {
        self.client.config().region().map(|r| r.as_ref())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, request: UploadRequest) -> Result<PutResponse> {
        let content_length = request.resolved_content_length()?;
        let target = RequestTarget::object(&request.bucket, &request.key);

        let output = self
            .client
            .put_object()
            .bucket(request.bucket.as_str())
            .key(request.key.as_str())
            .content_length(content_length as i64)
            .set_content_type(request.content_type.clone())
            .body(ByteStream::from(request.content.clone()))
            .send()
            .await
            .map_err(|e| from_sdk_error(e, target))?;

        Ok(PutResponse {
            e_tag: output.e_tag().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<GetObjectOutput> {
        let output = self
            .client
            .get_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::object(bucket, key)))?;

        let content_length = output.content_length().and_then(|len| u64::try_from(len).ok());
        let content_type = output.content_type().map(str::to_string);
        let e_tag = output.e_tag().map(str::to_string);

        let body = stream::unfold(output.body, |mut body| async move {
            let chunk = body.next().await?;
            Some((chunk.map_err(|e| StorageError::Transport(e.to_string())), body))
        })
        .boxed();

        Ok(GetObjectOutput {
            body,
            content_length,
            content_type,
            e_tag,
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::object(bucket, key)))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Service("response carried no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<PartResult> {
        let size = body.len() as u64;
        let number = i32::try_from(part_number).map_err(|_| {
            StorageError::InvalidRequest(format!("part number {} out of range", part_number))
        })?;

        let output = self
            .client
            .upload_part()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id)
            .part_number(number)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::upload(bucket, key, upload_id)))?;

        let e_tag = output.e_tag().map(str::to_string).ok_or_else(|| {
            StorageError::Service(format!("part {} acknowledged without an ETag", part_number))
        })?;

        Ok(PartResult {
            part_number,
            e_tag,
            size,
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartResult],
    ) -> Result<CompletionResponse> {
        let completed_parts = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(&part.e_tag)
                    .build()
            })
            .collect::<Vec<_>>();

        let manifest = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id)
            .multipart_upload(manifest)
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::upload(bucket, key, upload_id)))?;

        Ok(CompletionResponse {
            bucket: bucket.clone(),
            key: key.clone(),
            e_tag: output.e_tag().map(str::to_string),
            location: output.location().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
            parts: parts.len() as u32,
            size: parts.iter().map(|p| p.size).sum(),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        upload_id: &str,
    ) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::upload(bucket, key, upload_id)))?;
        Ok(())
    }

    async fn list_multipart_uploads(&self, bucket: &BucketName) -> Result<Vec<PendingUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_multipart_uploads()
                .bucket(bucket.as_str())
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(|e| from_sdk_error(e, RequestTarget::bucket(bucket)))?;

            for upload in output.uploads() {
                let (Some(key), Some(upload_id)) = (upload.key(), upload.upload_id()) else {
                    continue;
                };
                uploads.push(PendingUpload {
                    key: ObjectKey::new(key)?,
                    upload_id: upload_id.to_string(),
                    initiated: upload.initiated().and_then(|t| SystemTime::try_from(*t).ok()),
                });
            }

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_string);
            upload_id_marker = output.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<()> {
        // us-east-1 rejects an explicit location constraint
        let configuration = self
            .region()
            .filter(|region| *region != "us-east-1")
            .map(|region| {
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build()
            });

        let result = self
            .client
            .create_bucket()
            .bucket(bucket.as_str())
            .set_create_bucket_configuration(configuration)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some("BucketAlreadyOwnedByYou") => Ok(()),
            Err(e) => Err(from_sdk_error(e, RequestTarget::bucket(bucket))),
        }
    }

    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket.as_str()).send().await {
            Ok(_) => Ok(true),
            Err(e) => match from_sdk_error(e, RequestTarget::bucket(bucket)) {
                err if err.is_not_found() => Ok(false),
                err => Err(err),
            },
        }
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| from_sdk_error(e, RequestTarget::object(bucket, key)))?;
        Ok(())
    }
}
