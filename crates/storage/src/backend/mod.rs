//! Upload backend trait and implementations.
//!
//! This module defines the `UploadBackend` trait, the capability boundary
//! between the upload scheduler and whatever object store actually receives
//! the files (S3-compatible services, a local directory, an in-memory mock).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::UploadInfo;
use async_trait::async_trait;

/// Capability interface for pushing assets to remote storage.
///
/// The contract deliberately splits the slow part from the pure part:
/// [`upload`](Self::upload) talks to the provider and may fail, while
/// [`public_url`](Self::public_url) is a synchronous, deterministic function
/// of the [`UploadInfo`] alone. Callers rely on that split to embed final
/// URLs in rewritten stylesheets *before* any byte has reached the store.
///
/// # Examples
///
/// ```
/// use hoist_storage::{UploadBackend, UploadInfo, error::Result};
///
/// async fn push_one(backend: &dyn UploadBackend) -> Result<String> {
///     let info = UploadInfo::new("/build/assets/logo.png", "assets/1f2e3d.png");
///     let url = backend.public_url(&info);
///     backend.upload(&info).await?;
///     Ok(url)
/// }
/// ```
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Push a single local file to the remote store under its remote key.
    ///
    /// Failure carries a provider-specific error. No retries happen at this
    /// layer; a provider SDK may retry internally.
    async fn upload(&self, info: &UploadInfo) -> Result<()>;

    /// The public URL the uploaded asset will be served from.
    ///
    /// Synchronous and deterministic: no network access, no waiting on an
    /// in-flight upload. Implementations must not double the `/` between
    /// their domain and the remote key.
    fn public_url(&self, info: &UploadInfo) -> String;
}

/// Join a public domain and a remote key without doubling the separator.
pub(crate) fn domain_join(domain: &str, remote_path: &str) -> String {
    if domain.ends_with('/') || remote_path.starts_with('/') {
        format!("{domain}{remote_path}")
    } else {
        format!("{domain}/{remote_path}")
    }
}
