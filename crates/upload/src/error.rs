//! Upload Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An upload-scheduling error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload-scheduling operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Local file could not be read while deriving its remote name
    #[display("cannot read asset for naming: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// Session could not be assembled from its settings
    #[display("invalid session configuration")]
    Configuration,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}
