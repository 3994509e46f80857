//! S3-compatible upload backend.
//!
//! This module provides an upload backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration. Each target
//! specifies its own `key_id` and `key_secret`.
//!
//! TODO: Future iteration - support AWS SDK credential providers (profiles)
//! for actual AWS S3 targets. Not implemented now since the S3-compatible
//! services this was written against all use explicit credentials.

use crate::backend::domain_join;
use crate::error::{ErrorKind, Result};
use crate::models::UploadInfo;
use crate::UploadBackend;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::ByteStream,
};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible upload backend.
///
/// Pushes files into an S3 bucket and derives public URLs from a configured
/// serving domain (a CDN or the bucket's public endpoint).
///
/// # Supported Services
///
/// - AWS S3
/// - Backblaze B2 (via S3-compatible API)
/// - Tigris (Fly.io storage)
/// - MinIO
/// - Other S3-compatible services
///
/// # Examples
///
/// ```no_run
/// use hoist_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "cdn",
///     "my-bucket",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "https://static.example.com",
///     "access_key_id",
///     "secret_access_key",
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    /// Public serving domain prepended to remote keys.
    domain: String,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 upload backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `domain` - Public serving domain for uploaded assets
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        domain: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "hoist-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(config_builder.build());
        let rate_limiter = Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS));
        Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            domain: domain.into(),
            rate_limiter,
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }
}

#[async_trait]
impl UploadBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, info: &UploadInfo) -> Result<()> {
        let _permit = self.acquire_permit().await;
        tracing::debug!(bucket = %self.bucket, key = %info.remote_path, "put object");
        let body = ByteStream::from_path(&info.file_path)
            .await
            .map_err(|e| ErrorKind::BackendError(format!("cannot stream {}: {e}", info.file_path.display())))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&info.remote_path)
            .body(body)
            .send()
            .await
            .map_err(|e| ErrorKind::Network(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, info: &UploadInfo) -> String {
        domain_join(&self.domain, &info.remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> S3Backend {
        S3Backend::new(
            "test",
            "bucket",
            "us-east-1",
            None::<String>,
            "https://static.example.com",
            "key",
            "secret",
        )
    }

    #[test]
    fn test_public_url_joins_domain_and_key() {
        let info = UploadInfo::new("/src/a.png", "assets/abc.png");
        assert_eq!(backend().public_url(&info), "https://static.example.com/assets/abc.png");
    }

    #[test]
    fn test_public_url_no_doubled_slash() {
        let b = S3Backend::new(
            "test",
            "bucket",
            "us-east-1",
            None::<String>,
            "https://static.example.com/",
            "key",
            "secret",
        );
        let info = UploadInfo::new("/src/a.png", "assets/abc.png");
        assert_eq!(b.public_url(&info), "https://static.example.com/assets/abc.png");
    }
}
