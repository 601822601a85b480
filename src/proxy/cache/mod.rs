//! Filesystem-backed response cache.
//!
//! Entries are raw response bytes stored at `<root>/<hostname><resource_path>`. Nothing but the
//! bytes is persisted; whether a response is stored is decided once, when it is written.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

mod admission;
mod key;
mod lookup;
mod maintenance;
mod store;
mod writer;

pub use admission::{CacheAdmission, classify_response};
pub use key::{CacheKey, DEFAULT_LEAF};
pub use lookup::CacheLookup;

use maintenance::prepare_cache_root;
use store::DiskLayout;
use writer::KeyLocks;

/// What a call to [`CacheStore::write`] left on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWriteOutcome {
    /// The response bytes were stored.
    Stored { bytes: usize },
    /// An empty placeholder now occupies the key.
    Placeholder,
    /// Nothing was written.
    Skipped,
}

impl CacheWriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheWriteOutcome::Stored { .. } => "stored",
            CacheWriteOutcome::Placeholder => "placeholder",
            CacheWriteOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug)]
pub struct CacheStore {
    layout: DiskLayout,
    locks: KeyLocks,
    placeholders: bool,
}

impl CacheStore {
    /// Opens the cache rooted at `root`, creating it if needed.
    ///
    /// With `placeholders` set, a response that is not admitted still claims its key as an empty
    /// file, and later lookups serve that empty body.
    pub async fn open(root: PathBuf, placeholders: bool) -> Result<Self> {
        let layout = DiskLayout::new(root);
        prepare_cache_root(&layout).await?;
        info!(root = %layout.root().display(), placeholders, "cache store ready");
        Ok(Self {
            layout,
            locks: KeyLocks::default(),
            placeholders,
        })
    }

    pub fn location(&self, key: &CacheKey) -> PathBuf {
        self.layout.entry_path(key)
    }

    /// Persists `bytes` under `key` when `admit` is set, otherwise writes a placeholder (or
    /// nothing, if placeholders are disabled). Concurrent writes to one key are serialized and
    /// each replaces the entry atomically.
    pub async fn write(&self, key: &CacheKey, bytes: &[u8], admit: bool) -> Result<CacheWriteOutcome> {
        if !admit && !self.placeholders {
            debug!(key = %key, "response not admitted; cache left untouched");
            return Ok(CacheWriteOutcome::Skipped);
        }

        let body: &[u8] = if admit { bytes } else { &[] };
        let _guard = self.locks.acquire(key).await;
        let path = self.layout.replace_entry(key, body).await?;

        if admit {
            info!(key = %key, path = %path.display(), bytes = body.len(), "response cached");
            Ok(CacheWriteOutcome::Stored { bytes: body.len() })
        } else {
            info!(key = %key, path = %path.display(), "response not admitted; placeholder written");
            Ok(CacheWriteOutcome::Placeholder)
        }
    }
}
