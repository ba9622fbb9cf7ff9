//! Translation of AWS SDK errors into `StorageError`

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use objstream_core::{BucketName, ObjectKey, StorageError};

/// What a failed request was addressing, used to fill in not-found errors
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestTarget<'a> {
    pub bucket: &'a BucketName,
    pub key: Option<&'a ObjectKey>,
    pub upload_id: Option<&'a str>,
}

impl<'a> RequestTarget<'a> {
    pub fn bucket(bucket: &'a BucketName) -> Self {
        Self { bucket, key: None, upload_id: None }
    }

    pub fn object(bucket: &'a BucketName, key: &'a ObjectKey) -> Self {
        Self { bucket, key: Some(key), upload_id: None }
    }

    pub fn upload(bucket: &'a BucketName, key: &'a ObjectKey, upload_id: &'a str) -> Self {
        Self { bucket, key: Some(key), upload_id: Some(upload_id) }
    }
}

pub(crate) fn from_sdk_error<E, R>(err: SdkError<E, R>, target: RequestTarget<'_>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => StorageError::Transport(message),
        SdkError::ConstructionFailure(_) => StorageError::InvalidRequest(message),
        _ => classify(err.code(), message, target),
    }
}

/// Map an S3 error code onto the storage error taxonomy
pub(crate) fn classify(code: Option<&str>, message: String, target: RequestTarget<'_>) -> StorageError {
    let no_such_key = || StorageError::NoSuchKey {
        bucket: target.bucket.to_string(),
        key: target.key.map(ToString::to_string).unwrap_or_default(),
    };
    let no_such_bucket = || StorageError::NoSuchBucket {
        bucket: target.bucket.to_string(),
    };

    match code {
        Some("NoSuchKey") => no_such_key(),
        Some("NoSuchBucket") => no_such_bucket(),
        Some("NoSuchUpload") => StorageError::NoSuchUpload {
            upload_id: target.upload_id.unwrap_or_default().to_string(),
        },
        // HEAD responses carry no body, so the SDK only reports "NotFound"
        Some("NotFound") if target.key.is_some() => no_such_key(),
        Some("NotFound") => no_such_bucket(),
        Some(
            "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
            | "InvalidToken" | "AllAccessDisabled" | "Forbidden",
        ) => StorageError::Unauthorized(message),
        Some("InternalError" | "ServiceUnavailable" | "SlowDown") => StorageError::Service(message),
        Some("RequestTimeout") => StorageError::Transport(message),
        Some(_) => StorageError::InvalidRequest(message),
        None => StorageError::Service(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstream_core::ErrorCategory;

    fn category(code: Option<&str>, with_key: bool) -> ErrorCategory {
        let bucket = BucketName::new("test-bucket").unwrap();
        let key = ObjectKey::new("k").unwrap();
        let target = if with_key {
            RequestTarget::upload(&bucket, &key, "upload-1")
        } else {
            RequestTarget::bucket(&bucket)
        };
        classify(code, "message".into(), target).category()
    }

    #[test]
    fn test_not_found_codes() {
        assert_eq!(category(Some("NoSuchKey"), true), ErrorCategory::NotFound);
        assert_eq!(category(Some("NoSuchBucket"), false), ErrorCategory::NotFound);
        assert_eq!(category(Some("NoSuchUpload"), true), ErrorCategory::NotFound);
        assert_eq!(category(Some("NotFound"), false), ErrorCategory::NotFound);
    }

    #[test]
    fn test_head_not_found_uses_target() {
        let bucket = BucketName::new("test-bucket").unwrap();
        let key = ObjectKey::new("k").unwrap();

        let object = classify(Some("NotFound"), String::new(), RequestTarget::object(&bucket, &key));
        assert!(matches!(object, StorageError::NoSuchKey { ref key, .. } if key == "k"));

        let bucket_only = classify(Some("NotFound"), String::new(), RequestTarget::bucket(&bucket));
        assert!(matches!(bucket_only, StorageError::NoSuchBucket { .. }));
    }

    #[test]
    fn test_auth_and_service_codes() {
        assert_eq!(category(Some("AccessDenied"), true), ErrorCategory::Auth);
        assert_eq!(category(Some("SignatureDoesNotMatch"), true), ErrorCategory::Auth);
        assert_eq!(category(Some("SlowDown"), true), ErrorCategory::ServiceInternal);
        assert_eq!(category(Some("RequestTimeout"), true), ErrorCategory::Transport);
        assert_eq!(category(None, true), ErrorCategory::ServiceInternal);
    }

    #[test]
    fn test_request_errors() {
        assert_eq!(category(Some("EntityTooSmall"), true), ErrorCategory::InvalidRequest);
        assert_eq!(category(Some("InvalidPartOrder"), true), ErrorCategory::InvalidRequest);
        assert_eq!(category(Some("InvalidPart"), true), ErrorCategory::InvalidRequest);
    }
}
