use std::collections::HashMap;
use std::sync::Mutex;

use super::CacheStore;
use crate::caching::CacheKey;
use crate::caching::policy::EntryPolicy;

/// A store backed by a single-lock [`HashMap`].
///
/// Every operation takes the one coarse lock, and expiration settings are
/// ignored entirely: entries live until they are removed. Fine for tests and
/// for callers that never really contend.
pub struct SimpleStore<V> {
    entries: Mutex<HashMap<CacheKey, V>>,
}

impl<V> SimpleStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> Default for SimpleStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> CacheStore<V> for SimpleStore<V> {
    fn try_get(&self, key: &CacheKey) -> Option<V> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn get_or_add(&self, key: &CacheKey, candidate: V, _policy: &EntryPolicy) -> V {
        self.entries
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(candidate)
            .clone()
    }

    fn set(&self, key: &CacheKey, value: V, _policy: &EntryPolicy) {
        self.entries.lock().unwrap().insert(key.clone(), value);
    }

    fn remove(&self, key: &CacheKey) {
        self.entries.lock().unwrap().remove(key);
    }

    fn trim(&self, _pressure: u8) {
        // There is no per-entry bookkeeping to be selective with.
        self.clear();
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
