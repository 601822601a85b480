use std::io::ErrorKind;

use bytes::Bytes;
use tracing::{debug, warn};

use super::{CacheKey, CacheStore};

/// Outcome of a cache lookup. Unreadable entries are misses, same as absent ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Bytes),
    Miss,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss => "miss",
        }
    }
}

impl CacheStore {
    pub async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        match self.layout.read_entry(key).await {
            Ok(bytes) => {
                debug!(key = %key, bytes = bytes.len(), "cache hit");
                CacheLookup::Hit(Bytes::from(bytes))
            }
            Err(err) if err.source.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "cache miss");
                CacheLookup::Miss
            }
            Err(err) => {
                warn!(
                    key = %key,
                    path = %err.path.display(),
                    error = %err.source,
                    "cache entry unreadable; treating as miss"
                );
                CacheLookup::Miss
            }
        }
    }
}
