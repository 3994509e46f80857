//! Rewriter Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A rewriting error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rewriting operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The replacement callback failed for one reference. Only the
    /// declaration (or candidate) being rewritten is affected.
    #[display("failed to produce a replacement URL")]
    Replace,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            _ => false,
        }
    }
}
