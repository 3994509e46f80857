//! Storage models.

use std::path::PathBuf;

/// A single scheduled upload: which local file to push, and the remote key
/// it will live under.
///
/// Created exactly once per normalized local path and never mutated
/// afterwards. The public URL of the uploaded asset is a pure function of
/// this value (see [`UploadBackend::public_url`](crate::UploadBackend::public_url)),
/// so callers can embed the URL in rewritten output before the upload has
/// actually completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    /// Absolute local path, query/fragment suffix already stripped.
    pub file_path: PathBuf,
    /// Object-store key: remote prefix joined with the generated file name.
    pub remote_path: String,
}

impl UploadInfo {
    pub fn new(file_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            remote_path: remote_path.into(),
        }
    }
}
