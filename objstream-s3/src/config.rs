//! Connection settings for S3-compatible services

use serde::Deserialize;

/// Configuration for [`S3Storage`](crate::S3Storage)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Custom endpoint, e.g. `http://localhost:9000` for MinIO.
    /// `None` uses the AWS endpoint of `region`.
    pub endpoint_url: Option<String>,
    pub region: String,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    /// MinIO and most self-hosted services need this.
    pub force_path_style: bool,
    /// Static credentials; when unset the default AWS provider chain is used
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Timeout for a whole operation, retries included, in seconds
    pub operation_timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "us-east-1".into(),
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            connect_timeout_secs: 10,
            operation_timeout_secs: 300,
        }
    }
}

impl S3Config {
    /// Settings for a local MinIO-style endpoint with static credentials
    pub fn local(
        endpoint_url: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            force_path_style: true,
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
            ..Self::default()
        }
    }
}
