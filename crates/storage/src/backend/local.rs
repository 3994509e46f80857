//! Local-directory upload backend.
//!
//! Copies assets into a directory on the local filesystem instead of a
//! remote object store. Useful for dry-runs and for builds that serve the
//! "remote" tree from a sibling web root.

use crate::backend::domain_join;
use crate::error::{ErrorKind, Result};
use crate::models::UploadInfo;
use crate::path::validate as validate_key;
use crate::UploadBackend;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Upload backend that "uploads" by copying into a root directory.
///
/// Remote keys are validated against traversal and resolved relative to the
/// configured root. Public URLs are derived from a base URL exactly like the
/// S3 backend derives them from its domain.
///
/// # Examples
///
/// ```no_run
/// use hoist_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("dist", "/absolute/path/to/webroot", "/static")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory the remote keys resolve under
    root: PathBuf,
    /// Base URL prepended to remote keys.
    base_url: String,
}

impl LocalBackend {
    /// Create a new local-directory backend.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not absolute or cannot be created.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>, base_url: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on construction and
            // it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).or_raise(|| ErrorKind::BackendError(format!("cannot create {}", root.display())))?;
        }
        Ok(Self {
            name: name.into(),
            root,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl UploadBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, info: &UploadInfo) -> Result<()> {
        let target = self.root.join(validate_key(&info.remote_path)?);
        tracing::debug!(target = %target.display(), "copying into web root");
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        match fs::copy(&info.file_path, &target).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(info.file_path.clone()))
            },
            Err(e) => Err(ErrorKind::Io(e))?,
        }
    }

    fn public_url(&self, info: &UploadInfo) -> String {
        domain_join(&self.base_url, &info.remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    #[tokio::test]
    async fn test_upload_copies_into_root() {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), b"png bytes").unwrap();
        let root = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("dist", root.path(), "/static").unwrap();

        let info = UploadInfo::new(src.path(), "assets/deadbeef.png");
        backend.upload(&info).await.unwrap();
        assert_eq!(std::fs::read(root.path().join("assets/deadbeef.png")).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("dist", root.path(), "/static").unwrap();
        let info = UploadInfo::new("/definitely/not/here.png", "a.png");
        let err = backend.upload(&info).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal_key() {
        let root = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("dist", root.path(), "/static").unwrap();
        let info = UploadInfo::new("/src/a.png", "../escape.png");
        assert!(backend.upload(&info).await.is_err());
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(LocalBackend::new("dist", "relative/dir", "/static").is_err());
    }

    #[test]
    fn test_public_url() {
        let root = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("dist", root.path(), "/static").unwrap();
        let info = UploadInfo::new("/src/a.png", "assets/a.png");
        assert_eq!(backend.public_url(&info), "/static/assets/a.png");
    }
}
