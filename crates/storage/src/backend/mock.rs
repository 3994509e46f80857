//! In-memory upload backend for testing.

use crate::error::{ErrorKind, Result};
use crate::models::UploadInfo;
use crate::UploadBackend;
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory upload backend for testing.
///
/// Records every upload behind a [`Mutex`], so all trait methods can operate
/// on `&self` without external synchronisation. Ideal for unit tests that
/// need an [`UploadBackend`] without filesystem or network dependencies.
///
/// # Examples
///
/// ```
/// use hoist_storage::backend::{MockBackend, UploadBackend};
/// use hoist_storage::UploadInfo;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// let info = UploadInfo::new("/src/logo.png", "assets/logo.png");
/// assert_eq!(backend.public_url(&info), "https://example.com/assets/logo.png");
///
/// backend.upload(&info).await?;
/// assert_eq!(backend.uploads(), vec![info]);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockBackend {
    uploads: Mutex<Vec<UploadInfo>>,
    /// Remote keys containing this substring fail their upload.
    fail_keys_containing: Option<String>,
}

impl MockBackend {
    /// Create a mock backend whose uploads fail when the remote key contains
    /// the given substring. Successful uploads are still recorded.
    pub fn failing_on(substring: impl Into<String>) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail_keys_containing: Some(substring.into()),
        }
    }

    /// Snapshot of every recorded upload, in dispatch order.
    pub fn uploads(&self) -> Vec<UploadInfo> {
        self.uploads.lock().unwrap().clone()
    }

    /// Number of uploads dispatched so far (successful or failed).
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl UploadBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, info: &UploadInfo) -> Result<()> {
        self.uploads.lock().unwrap().push(info.clone());
        if let Some(needle) = &self.fail_keys_containing
            && info.remote_path.contains(needle.as_str())
        {
            exn::bail!(ErrorKind::BackendError(format!("mock failure for {}", info.remote_path)));
        }
        Ok(())
    }

    fn public_url(&self, info: &UploadInfo) -> String {
        format!("https://example.com/{}", info.remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    #[tokio::test]
    async fn test_records_uploads_in_order() {
        let backend = MockBackend::default();
        backend.upload(&UploadInfo::new("/a.png", "1.png")).await.unwrap();
        backend.upload(&UploadInfo::new("/b.png", "2.png")).await.unwrap();
        let keys: Vec<_> = backend.uploads().into_iter().map(|i| i.remote_path).collect();
        assert_eq!(keys, vec!["1.png", "2.png"]);
    }

    #[tokio::test]
    async fn test_failing_on_substring() {
        let backend = MockBackend::failing_on("bad");
        backend.upload(&UploadInfo::new("/a.png", "good.png")).await.unwrap();
        let err = backend.upload(&UploadInfo::new("/b.png", "bad.png")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::BackendError(_)));
        // Failed uploads are still recorded.
        assert_eq!(backend.upload_count(), 2);
    }
}
