//! Session settings: figment-backed loading and validation.
//!
//! Settings come from a TOML file (an explicit path, or a discovered
//! per-user default) overlaid with `HOIST_`-prefixed environment variables.
//! Validation is fatal: a session is never constructed from a half-usable
//! configuration.

use crate::error::{ErrorKind, Result};
use crate::filter::Filter;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_concurrency() -> usize {
    8
}

fn default_enable() -> bool {
    true
}

/// How remote file names are derived from local assets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    /// Content-addressed: BLAKE3 digest of the file bytes.
    #[default]
    Hash,
    /// Session-unique random token.
    Random,
}

/// The remote store assets are pushed to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum RemoteSettings {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        /// Public serving domain for uploaded assets.
        domain: String,
        key_id: String,
        key_secret: String,
    },
    Local {
        root: PathBuf,
        base_url: String,
    },
}

/// Everything a build session recognizes.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Disables the whole pipeline when false; the host skips rewriting and
    /// uploading entirely.
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Required: without a remote there is nothing to upload to.
    pub remote: Option<RemoteSettings>,
    /// Remote folder: absent means a dated folder, an empty string disables
    /// the prefix entirely.
    pub prefix: Option<String>,
    #[serde(default)]
    pub naming: NamingStrategy,
    /// Upload each asset as soon as it is discovered (dev/watch builds)
    /// instead of batching at end-of-build.
    #[serde(default)]
    pub immediate: bool,
    /// Suppress progress output.
    #[serde(default)]
    pub silent: bool,
    /// Batch upload concurrency limit.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Settings {
    /// Loads settings from `path` (or the discovered per-user config file)
    /// overlaid with `HOIST_`-prefixed environment variables, then
    /// validates them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        match path {
            Some(file) => {
                tracing::debug!(path = %file.display(), "loading configuration");
                figment = figment.merge(Toml::file(file));
            },
            None => {
                if let Some(dirs) = ProjectDirs::from("", "", "hoist") {
                    let file = dirs.config_dir().join("hoist.toml");
                    tracing::debug!(path = %file.display(), "loading configuration");
                    figment = figment.merge(Toml::file(file));
                }
            },
        }
        let settings: Self = figment.merge(Env::prefixed("HOIST_").split("__")).extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects configurations a session could not run with.
    pub fn validate(&self) -> Result<()> {
        match &self.remote {
            None => exn::bail!(ErrorKind::Missing("remote")),
            Some(RemoteSettings::S3 { bucket, domain, .. }) => {
                if bucket.is_empty() {
                    exn::bail!(ErrorKind::Invalid("s3 bucket must not be empty".to_string()));
                }
                if domain.is_empty() {
                    exn::bail!(ErrorKind::Invalid("s3 serving domain must not be empty".to_string()));
                }
            },
            Some(RemoteSettings::Local { base_url, .. }) => {
                if base_url.is_empty() {
                    exn::bail!(ErrorKind::Invalid("local base_url must not be empty".to_string()));
                }
            },
        }
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("concurrency must be non-zero".to_string()));
        }
        // Surface unusable patterns at setup rather than mid-build.
        self.filter()?;
        Ok(())
    }

    /// Compiles the include/exclude patterns.
    pub fn filter(&self) -> Result<Filter> {
        Filter::compile(&self.include, &self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    const S3_CONFIG: &str = r#"
        prefix = "assets"
        concurrency = 4
        naming = "random"
        exclude = ["node_modules"]

        [remote]
        provider = "s3"
        bucket = "my-bucket"
        region = "us-west-004"
        domain = "https://static.example.com"
        key_id = "id"
        key_secret = "secret"
    "#;

    #[test]
    fn test_load_s3_config() {
        let file = write_config(S3_CONFIG);
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.prefix.as_deref(), Some("assets"));
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.naming, NamingStrategy::Random);
        assert!(matches!(settings.remote, Some(RemoteSettings::S3 { .. })));
    }

    #[test]
    fn test_defaults() {
        let file = write_config(
            r#"
            [remote]
            provider = "local"
            root = "/var/www"
            base_url = "/static"
        "#,
        );
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.naming, NamingStrategy::Hash);
        assert_eq!(settings.prefix, None);
        assert!(settings.enable);
        assert!(!settings.immediate);
        assert!(!settings.silent);
        assert!(settings.include.is_empty());
    }

    #[test]
    fn test_missing_remote_is_fatal() {
        let file = write_config("prefix = \"assets\"");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Missing("remote")));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let file = write_config(
            r#"
            concurrency = 0

            [remote]
            provider = "local"
            root = "/var/www"
            base_url = "/static"
        "#,
        );
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let file = write_config(
            r#"
            [remote]
            provider = "s3"
            bucket = ""
            region = "r"
            domain = "https://static.example.com"
            key_id = "id"
            key_secret = "secret"
        "#,
        );
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_bad_filter_pattern_rejected_at_load() {
        let file = write_config(
            r#"
            include = ["(unclosed"]

            [remote]
            provider = "local"
            root = "/var/www"
            base_url = "/static"
        "#,
        );
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Pattern(_)));
    }
}
