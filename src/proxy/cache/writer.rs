use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::CacheKey;

/// Per-key write locks. Entries live only while some writer holds or waits on them.
#[derive(Debug, Default)]
pub(super) struct KeyLocks {
    locks: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub(super) async fn acquire(&self, key: &CacheKey) -> KeyWriteGuard<'_> {
        let lock = {
            let mut guard = self.locks.lock();
            guard
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let held = lock.lock_owned().await;
        KeyWriteGuard {
            registry: self,
            key: key.clone(),
            held: Some(held),
        }
    }

    #[cfg(test)]
    pub(super) fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

pub(super) struct KeyWriteGuard<'a> {
    registry: &'a KeyLocks,
    key: CacheKey,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyWriteGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut guard = self.registry.locks.lock();
        let idle = guard
            .get(&self.key)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if idle {
            guard.remove(&self.key);
        }
    }
}
