//! Deduplicating upload scheduler.
//!
//! One [`UploadContext`] is exclusively owned by one build session. It maps
//! each normalized local path to exactly one [`UploadInfo`], hands out the
//! public URL synchronously once the remote name is known, and defers the
//! actual uploads: immediately-dispatched ones run detached (dev/watch
//! builds need a usable URL before the file finishes uploading), the rest
//! run in one bounded batch at the end of the build.

use crate::error::Result;
use crate::filename::FileNamer;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use hoist_storage::error::Result as StorageResult;
use hoist_storage::{BackendHandle, UploadInfo, join_remote, strip_url_suffix};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// The remote folder every generated file name is placed under.
pub enum RemotePrefix {
    /// Dated folder (`YYYY-MM-DD`), the default.
    Dated,
    /// A fixed folder name.
    Fixed(String),
    /// Generated once when the session's context is constructed.
    Generated(Box<dyn Fn() -> String + Send + Sync>),
    /// No folder; names land at the storage root.
    Disabled,
}

impl RemotePrefix {
    fn resolve(&self) -> String {
        match self {
            Self::Dated => {
                let today = OffsetDateTime::now_utc().date();
                format!("{:04}-{:02}-{:02}", today.year(), u8::from(today.month()), today.day())
            },
            Self::Fixed(prefix) => prefix.clone(),
            Self::Generated(generate) => generate(),
            Self::Disabled => String::new(),
        }
    }
}

type Slot = Arc<OnceCell<UploadInfo>>;

struct Inner {
    /// Insertion-ordered, append-only: entries are never removed or
    /// overwritten within a session.
    cache: IndexMap<PathBuf, Slot>,
    /// Normalized paths whose immediate upload has already been triggered.
    dispatched: HashSet<PathBuf>,
    /// Handles of detached immediate uploads, joined by [`UploadContext::flush_all`]
    /// so no failure can vanish silently.
    in_flight: Vec<JoinHandle<(UploadInfo, StorageResult<()>)>>,
}

/// Deduplicating cache of local-path → remote-descriptor mappings, plus the
/// upload scheduling built on top of it.
pub struct UploadContext {
    backend: BackendHandle,
    namer: Arc<dyn FileNamer>,
    prefix: String,
    concurrency: usize,
    silent: bool,
    inner: Mutex<Inner>,
}

impl UploadContext {
    /// The prefix is resolved once, here: every asset of the session lands
    /// in the same folder even when the prefix is generated.
    pub fn new(
        backend: BackendHandle,
        namer: Arc<dyn FileNamer>,
        prefix: RemotePrefix,
        concurrency: usize,
        silent: bool,
    ) -> Self {
        Self {
            backend,
            namer,
            prefix: prefix.resolve(),
            concurrency: concurrency.max(1),
            silent,
            inner: Mutex::new(Inner {
                cache: IndexMap::new(),
                dispatched: HashSet::new(),
                in_flight: Vec::new(),
            }),
        }
    }

    /// Every [`UploadInfo`] created so far, in discovery order.
    pub fn files(&self) -> Vec<UploadInfo> {
        // unwrap is safe: nothing panics while the state lock is held
        self.inner.lock().unwrap().cache.values().filter_map(|slot| slot.get().cloned()).collect()
    }

    /// Resolves a local asset reference to its public remote URL, creating
    /// and scheduling the upload on first sight.
    ///
    /// The path is normalized (query/fragment suffix stripped) and looked
    /// up; a hit returns the previously derived URL with no recomputation
    /// and no re-trigger. On a miss the cache slot is reserved *before* any
    /// await, so concurrent callers for the same normalized path agree on
    /// one slot and the remote name is computed exactly once; losers simply
    /// await the winner's value.
    ///
    /// With `immediate`, the winning caller also spawns a detached upload —
    /// at most once per normalized path. The returned URL never waits on
    /// the network.
    pub async fn resolve_and_queue(&self, file_path: impl AsRef<Path>, immediate: bool) -> Result<String> {
        let normalized = strip_url_suffix(file_path.as_ref().to_string_lossy());
        let slot = {
            // unwrap is safe: nothing panics while the state lock is held
            let mut inner = self.inner.lock().unwrap();
            inner.cache.entry(normalized.clone()).or_default().clone()
        };
        let mut created = false;
        let info = slot
            .get_or_try_init(|| {
                created = true;
                self.create_upload_info(&normalized)
            })
            .await?;
        if immediate && created {
            self.dispatch_immediate(&normalized, info);
        }
        Ok(self.backend.public_url(info))
    }

    async fn create_upload_info(&self, normalized: &Path) -> Result<UploadInfo> {
        let name = self.namer.remote_name(normalized).await?;
        let info = UploadInfo::new(normalized, join_remote(&self.prefix, &name));
        if !self.silent {
            tracing::info!(path = %info.file_path.display(), "found asset file");
        }
        Ok(info)
    }

    fn dispatch_immediate(&self, normalized: &Path, info: &UploadInfo) {
        // unwrap is safe: nothing panics while the state lock is held
        let mut inner = self.inner.lock().unwrap();
        if !inner.dispatched.insert(normalized.to_path_buf()) {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let info = info.clone();
        let silent = self.silent;
        inner.in_flight.push(tokio::spawn(async move {
            if !silent {
                tracing::info!(path = %info.file_path.display(), remote = %info.remote_path, "uploading");
            }
            let result = backend.upload(&info).await;
            (info, result)
        }));
    }

    /// Uploads every cached file and waits for all of them, including any
    /// still-running immediate uploads.
    ///
    /// Failures are logged and swallowed — one asset's failure neither
    /// stops the remaining uploads nor fails the caller, and nothing is
    /// retried. At most `concurrency` batch uploads are in flight at once.
    /// An empty cache is a no-op.
    pub async fn flush_all(&self) {
        // Join the detached immediate uploads first so a failure that
        // nobody awaited still surfaces before the session ends.
        let in_flight: Vec<_> = {
            // unwrap is safe: nothing panics while the state lock is held
            self.inner.lock().unwrap().in_flight.drain(..).collect()
        };
        for handle in in_flight {
            match handle.await {
                Ok((_, Ok(()))) => {},
                Ok((info, Err(error))) => {
                    tracing::error!(path = %info.file_path.display(), error = %error, "immediate upload failed");
                },
                Err(join_error) => {
                    tracing::error!(error = %join_error, "immediate upload task panicked");
                },
            }
        }

        let files = self.files();
        if files.is_empty() {
            return;
        }
        if !self.silent {
            tracing::info!(count = files.len(), backend = self.backend.name(), "start uploading");
        }

        let mut queued: Vec<_> = files.into_iter().map(|info| self.upload_one(info)).collect();
        let mut processing = FuturesUnordered::new();
        let in_flight_now = self.concurrency.min(queued.len());
        processing.extend(queued.drain(..in_flight_now));
        let mut failures = 0usize;
        while let Some(ok) = processing.next().await {
            if !ok {
                failures += 1;
            }
            // Pop-n-push, but FIFO instead of LIFO.
            if !queued.is_empty() {
                processing.push(queued.remove(0));
            }
        }
        match failures {
            0 if !self.silent => tracing::info!("all uploads completed"),
            0 => {},
            n => tracing::error!(failed = n, "some uploads failed"),
        }
    }

    /// Runs one upload, logging the outcome. Returns whether it succeeded.
    async fn upload_one(&self, info: UploadInfo) -> bool {
        if !self.silent {
            tracing::info!(path = %info.file_path.display(), remote = %info.remote_path, "uploading");
        }
        match self.backend.upload(&info).await {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(path = %info.file_path.display(), error = %error, "upload failed");
                false
            },
        }
    }
}
