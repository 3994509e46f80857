//! Local-path normalization and remote-key utilities.
//!
//! Bundlers hand us asset references like `img/logo.png?v=3` — the query or
//! fragment suffix selects build behavior, not file content, so the cache
//! key must be the bare path. Remote keys are validated against traversal
//! before a backend writes anywhere near a filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Strips a trailing query or fragment suffix from a local asset reference.
///
/// Two references differing only by query parameters resolve to the same
/// local file, and must map to the same upload.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoist_storage::strip_url_suffix;
///
/// assert_eq!(strip_url_suffix("img/a.png?v=2"), Path::new("img/a.png"));
/// assert_eq!(strip_url_suffix("img/a.png#frag"), Path::new("img/a.png"));
/// assert_eq!(strip_url_suffix("img/a.png"), Path::new("img/a.png"));
/// ```
pub fn strip_url_suffix(reference: impl AsRef<str>) -> PathBuf {
    let reference = reference.as_ref();
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    PathBuf::from(&reference[..end])
}

/// Joins a remote prefix and a generated file name into an object-store key.
///
/// POSIX-style: an empty prefix yields the name alone, and a trailing slash
/// on the prefix is never doubled.
///
/// # Examples
///
/// ```
/// use hoist_storage::join_remote;
///
/// assert_eq!(join_remote("assets", "abc.png"), "assets/abc.png");
/// assert_eq!(join_remote("assets/", "abc.png"), "assets/abc.png");
/// assert_eq!(join_remote("", "abc.png"), "abc.png");
/// ```
pub fn join_remote(prefix: impl AsRef<str>, name: impl AsRef<str>) -> String {
    let prefix = prefix.as_ref().trim_end_matches('/');
    let name = name.as_ref().trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Validates a remote key for use as a relative filesystem path.
///
/// Ensures that keys don't escape the backend root (no `..` traversal).
/// Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoist_storage::validate_key;
///
/// assert!(validate_key("assets/abc123.png").is_ok());
/// assert!(validate_key("a/../abc123.png").is_ok()); // (never leaves the root)
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<PathBuf> {
    let key = key.as_ref();
    // Use Rust's built-in path component parser for robust handling rather
    // than splitting on separators by hand.
    let mut components = Vec::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls — reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(components.into_iter().collect()),
    }
}
