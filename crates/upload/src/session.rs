//! One build session's view of the rewriting + upload pipeline.
//!
//! The [`Session`] is the single polymorphic seam the build pipeline talks
//! to: the host supplies declaration text and resolved asset paths and
//! calls [`finish`](Session::finish) at end-of-build; the core never
//! branches on which bundler is driving it. Reference resolution is
//! delegated back to the host through [`AssetResolver`].

use crate::context::{RemotePrefix, UploadContext};
use crate::error::{ErrorKind, Result};
use crate::filename::{ContentHashNamer, FileNamer, RandomTokenNamer};
use async_trait::async_trait;
use exn::ResultExt;
use hoist_config::{Filter, NamingStrategy, Settings};
use hoist_css::UrlReplacer;
use hoist_css::error::{ErrorKind as CssErrorKind, Result as CssResult};
use hoist_storage::BackendHandle;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves a raw stylesheet reference to an absolute local file path.
///
/// Supplied by the build-pipeline collaborator; returning `None` leaves the
/// reference untouched in the output.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, url: &str, importer: Option<&Path>) -> Option<PathBuf>;
}

/// Wires the CSS rewriter, the host's resolver, and the upload scheduler
/// together for the lifetime of one build.
pub struct Session {
    context: UploadContext,
    resolver: Arc<dyn AssetResolver>,
    filter: Filter,
    immediate: bool,
}

impl Session {
    pub fn new(context: UploadContext, resolver: Arc<dyn AssetResolver>, filter: Filter, immediate: bool) -> Self {
        Self {
            context,
            resolver,
            filter,
            immediate,
        }
    }

    /// Assembles a session from validated [`Settings`] and the backend the
    /// host constructed for them.
    pub fn from_settings(
        settings: &Settings,
        backend: BackendHandle,
        resolver: Arc<dyn AssetResolver>,
    ) -> Result<Self> {
        let filter = settings.filter().or_raise(|| ErrorKind::Configuration)?;
        let namer: Arc<dyn FileNamer> = match settings.naming {
            NamingStrategy::Hash => Arc::new(ContentHashNamer),
            NamingStrategy::Random => Arc::new(RandomTokenNamer::default()),
        };
        let prefix = match settings.prefix.as_deref() {
            None => RemotePrefix::Dated,
            Some("") => RemotePrefix::Disabled,
            Some(folder) => RemotePrefix::Fixed(folder.to_string()),
        };
        let context = UploadContext::new(backend, namer, prefix, settings.concurrency, settings.silent);
        Ok(Self::new(context, resolver, filter, settings.immediate))
    }

    /// Rewrites one CSS declaration value, scheduling an upload for every
    /// replaceable reference that resolves to a local file.
    pub async fn rewrite_declaration(&self, value: &str, importer: Option<&Path>) -> CssResult<String> {
        hoist_css::rewrite_declaration(value, importer, self).await
    }

    /// Direct entry for non-CSS asset references the host has already
    /// resolved to absolute paths. Returns `None` when the include/exclude
    /// filter rejects the path.
    pub async fn resolve_asset(&self, path: impl AsRef<Path>) -> Result<Option<String>> {
        let path = path.as_ref();
        if !self.filter.matches(&path.to_string_lossy()) {
            return Ok(None);
        }
        self.context.resolve_and_queue(path, self.immediate).await.map(Some)
    }

    /// End-of-build completion hook: uploads everything still pending.
    pub async fn finish(&self) {
        self.context.flush_all().await;
    }

    pub fn context(&self) -> &UploadContext {
        &self.context
    }
}

#[async_trait]
impl UrlReplacer for Session {
    async fn replace(&self, url: &str, importer: Option<&Path>) -> CssResult<String> {
        let decoded = percent_decode_str(url)
            .decode_utf8()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| url.to_string());
        // References the host cannot resolve stay as they are. Stylesheet
        // references deliberately bypass the include/exclude filter: the
        // filter scopes which *modules* the pipeline hands over, not which
        // files a stylesheet may point at.
        match self.resolver.resolve(&decoded, importer).await {
            Some(resolved) => {
                self.context.resolve_and_queue(&resolved, self.immediate).await.or_raise(|| CssErrorKind::Replace)
            },
            None => Ok(url.to_string()),
        }
    }
}
