use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of async mutexes keyed by id.
///
/// Serializes work per vehicle and per wallet owner: holders of the
/// same key queue up, while unrelated keys proceed without contention.
/// Lock entries are created on first use and kept for the lifetime of
/// the registry.
pub struct LockMap<K> {
    inner: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> LockMap<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, waiting behind any current holder.
    /// The registry lock is released before awaiting the key lock, so
    /// holders of other keys are never blocked.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inner = self.inner.lock().await;
            inner
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
