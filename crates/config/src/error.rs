//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Configuration failures are fatal:
//! they are raised at setup and the session never starts.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A required setting (such as the remote adapter) was not provided
    #[display("required setting is missing: {_0}")]
    Missing(#[error(not(source))] &'static str),
    /// A provided setting has an unusable value
    #[display("invalid setting: {_0}")]
    Invalid(#[error(not(source))] String),
    /// An include/exclude pattern failed to compile
    #[display("invalid filter pattern: {_0}")]
    Pattern(#[error(not(source))] String),
    /// The configuration sources could not be read or deserialized
    #[display("cannot load configuration")]
    Load,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            _ => false,
        }
    }
}
