//! Keyed lock registry.
//!
//! Entries are created on first use and dropped once no caller holds them,
//! so the table stays proportional to in-flight work.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct LockTable<K, T> {
    entries: Mutex<HashMap<K, Arc<T>>>,
}

impl<K, T> Default for LockTable<K, T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, T: Default> LockTable<K, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with the shared value for `key`.
    ///
    /// Every concurrent caller for the same key sees the same `T`.
    pub fn with<R>(&self, key: &K, f: impl FnOnce(&T) -> R) -> R {
        let entry = Arc::clone(self.entries().entry(key.clone()).or_default());
        let result = f(&entry);

        let mut entries = self.entries();
        drop(entry);
        if entries
            .get(key)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            entries.remove(key);
        }
        result
    }

    /// Number of keys currently in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
