// libs/shared/database/src/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::store::{LockKey, StoreError};

type LockMap = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

/// Keyed locks held for the lifetime of a transaction.
///
/// Keys are always acquired in sorted order so two transactions with
/// overlapping scopes cannot deadlock. An entry only lives while some scope
/// holds or waits on it.
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: LockMap,
}

pub struct ScopeGuard {
    keys: Vec<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl ScopeGuard {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // Each guard keeps its mutex alive, so release them before counting.
        self.guards.clear();
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        for key in &self.keys {
            // Entries are cloned under this map lock, so a count of one means
            // no other scope holds or waits on the key.
            if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(key);
            }
        }
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: LockKey) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Unavailable("lock registry poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(key).or_default()))
    }

    pub async fn acquire(&self, scope: &[LockKey]) -> Result<ScopeGuard, StoreError> {
        let mut keys = scope.to_vec();
        keys.sort();
        keys.dedup();

        // Built up front so a cancelled acquire still clears its entries.
        let mut held = ScopeGuard {
            guards: Vec::with_capacity(keys.len()),
            keys,
            locks: Arc::clone(&self.locks),
        };
        for index in 0..held.keys.len() {
            let key = held.keys[index];
            let lock = self.entry(key)?;
            held.guards.push(lock.lock_owned().await);
            debug!("Acquired lock {}", key);
        }

        Ok(held)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}
