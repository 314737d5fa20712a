use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::repository::RepositoryError;

/// Per-key mutual exclusion. Work on different keys runs concurrently; work on the
/// same key is serialized. An entry lives only while some caller holds or awaits it.
pub(crate) struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn lock_for(&self, key: &K) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lock table poisoned".to_string()))?;
        Ok(locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Drop the table entry for `key` when `lock` is its last outstanding handle.
    ///
    /// Handles are cloned, counted, and dropped only under the table lock, so the last
    /// caller out always sees a count of two (the table plus its own).
    fn release(&self, key: &K, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        let is_last = Arc::strong_count(&lock) == 2
            && locks
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &lock));
        if is_last {
            locks.remove(key);
        }
        drop(lock);
    }

    /// Run `f` while holding the lock for `key`.
    pub(crate) fn with<T, E>(&self, key: &K, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let lock = self.lock_for(key)?;
        let outcome = match lock.lock() {
            Ok(_guard) => Ok(f()),
            Err(_) => Err(RepositoryError::Unavailable(
                "keyed lock poisoned".to_string(),
            )),
        };
        self.release(key, lock);
        outcome?
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
