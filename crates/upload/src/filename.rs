//! Remote file-name strategies.
//!
//! A [`FileNamer`] turns a local asset path into the file name it will carry
//! in remote storage. Two interchangeable policies are provided: stable
//! content-addressed names and session-unique random tokens.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use rand::Rng;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Derives the remote file name for a local asset.
#[async_trait]
pub trait FileNamer: Send + Sync {
    async fn remote_name(&self, path: &Path) -> Result<String>;
}

/// Content-addressed names: BLAKE3 digest of the full file bytes,
/// hex-encoded, with the source extension appended.
///
/// Identical bytes at different local paths yield identical names, which
/// deduplicates on the storage side. The scheduler still dispatches one
/// upload per distinct local path; those extra uploads overwrite the same
/// key.
pub struct ContentHashNamer;

#[async_trait]
impl FileNamer for ContentHashNamer {
    async fn remote_name(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        Ok(with_source_ext(blake3::hash(&bytes).to_string(), path))
    }
}

const TOKEN_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const DEFAULT_TOKEN_LENGTH: usize = 10;

/// Fixed-length random tokens from a 64-character URL-safe alphabet.
///
/// An issued-token registry forces regeneration on collision. The registry
/// is owned by this namer, which is owned by one build session: it grows
/// for the session's lifetime and is discarded with it — never a
/// process-wide singleton.
pub struct RandomTokenNamer {
    issued: Mutex<HashSet<String>>,
    length: usize,
}

impl RandomTokenNamer {
    pub fn new(length: usize) -> Self {
        Self {
            issued: Mutex::new(HashSet::new()),
            length,
        }
    }

    fn draw(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length).map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char).collect()
    }
}
impl Default for RandomTokenNamer {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

#[async_trait]
impl FileNamer for RandomTokenNamer {
    async fn remote_name(&self, path: &Path) -> Result<String> {
        // unwrap is safe: nothing panics while the registry lock is held
        let mut issued = self.issued.lock().unwrap();
        loop {
            let token = self.draw();
            if issued.insert(token.clone()) {
                return Ok(with_source_ext(token, path));
            }
        }
    }
}

fn with_source_ext(stem: String, path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dir/a.png", "stem.png")]
    #[case("archive.tar.gz", "stem.gz")]
    #[case("LICENSE", "stem")]
    #[case(".hidden", "stem")]
    fn test_with_source_ext(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(with_source_ext("stem".to_string(), Path::new(path)), expected);
    }

    #[tokio::test]
    async fn test_content_hash_name() {
        let file = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        std::fs::write(file.path(), b"png bytes").unwrap();
        let name = ContentHashNamer.remote_name(file.path()).await.unwrap();
        assert_eq!(name, format!("{}.png", blake3::hash(b"png bytes")));
    }

    #[tokio::test]
    async fn test_content_hash_is_stable_across_paths() {
        let one = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        let two = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        std::fs::write(one.path(), b"same").unwrap();
        std::fs::write(two.path(), b"same").unwrap();
        assert_eq!(
            ContentHashNamer.remote_name(one.path()).await.unwrap(),
            ContentHashNamer.remote_name(two.path()).await.unwrap(),
        );
    }

    #[tokio::test]
    async fn test_content_hash_missing_file() {
        let err = ContentHashNamer.remote_name(Path::new("/not/a/file.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Read(_)));
    }

    #[tokio::test]
    async fn test_random_tokens_unique_within_session() {
        // A single-character token has only 64 possible values, so drawing
        // all 64 is certain to collide along the way; uniqueness of the
        // results proves the registry regenerated.
        let namer = RandomTokenNamer::new(1);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let name = namer.remote_name(Path::new("a.png")).await.unwrap();
            assert!(seen.insert(name));
        }
    }

    #[tokio::test]
    async fn test_random_token_keeps_extension() {
        let name = RandomTokenNamer::default().remote_name(Path::new("dir/a.woff2")).await.unwrap();
        assert!(name.ends_with(".woff2"));
        assert_eq!(name.len(), DEFAULT_TOKEN_LENGTH + ".woff2".len());
    }

    #[tokio::test]
    async fn test_no_extension_yields_bare_stem() {
        let name = RandomTokenNamer::default().remote_name(Path::new("LICENSE")).await.unwrap();
        assert_eq!(name.len(), DEFAULT_TOKEN_LENGTH);
    }
}
