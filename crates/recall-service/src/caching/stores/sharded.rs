use dashmap::DashMap;

use super::CacheStore;
use crate::caching::CacheKey;
use crate::caching::policy::EntryPolicy;

/// A store backed by a sharded concurrent map.
///
/// `get_or_add` is atomic per key without a store-wide lock, which makes this
/// the default choice when many tasks race on the same executor. Expiration
/// settings are ignored: entries live until they are removed.
pub struct ShardedStore<V> {
    entries: DashMap<CacheKey, V>,
}

impl<V: Clone + Send + Sync> ShardedStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone + Send + Sync> Default for ShardedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for ShardedStore<V> {
    fn try_get(&self, key: &CacheKey) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn get_or_add(&self, key: &CacheKey, candidate: V, _policy: &EntryPolicy) -> V {
        self.entries
            .entry(key.clone())
            .or_insert(candidate)
            .value()
            .clone()
    }

    fn set(&self, key: &CacheKey, value: V, _policy: &EntryPolicy) {
        self.entries.insert(key.clone(), value);
    }

    fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    fn trim(&self, _pressure: u8) {
        // There is no per-entry bookkeeping to be selective with.
        self.clear();
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_get_or_add_keeps_the_first_entry() {
        let store = ShardedStore::new();
        let key = CacheKey::for_testing("a");

        assert_eq!(store.try_get(&key), None);
        assert_eq!(store.get_or_add(&key, 1, &EntryPolicy::DEFAULT), 1);
        assert_eq!(store.get_or_add(&key, 2, &EntryPolicy::DEFAULT), 1);
        assert_eq!(store.try_get(&key), Some(1));
    }

    #[test]
    fn test_set_overwrites() {
        let store = ShardedStore::new();
        let key = CacheKey::for_testing("a");

        store.set(&key, 1, &EntryPolicy::DEFAULT);
        store.set(&key, 2, &EntryPolicy::DEFAULT);

        assert_eq!(store.try_get(&key), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let store = ShardedStore::new();
        let a = CacheKey::for_testing("a");
        let b = CacheKey::for_testing("b");

        store.set(&a, 1, &EntryPolicy::DEFAULT);
        store.set(&b, 2, &EntryPolicy::DEFAULT);

        store.remove(&a);
        assert_eq!(store.try_get(&a), None);
        assert_eq!(store.try_get(&b), Some(2));

        store.clear();
        assert_eq!(store.try_get(&b), None);
    }

    #[test]
    fn test_racing_threads_agree_on_the_winner() {
        let store = Arc::new(ShardedStore::new());
        let key = CacheKey::for_testing("contended");

        let handles: Vec<_> = (0..8)
            .map(|candidate| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || {
                    store.get_or_add(&key, candidate, &EntryPolicy::DEFAULT)
                })
            })
            .collect();

        let winners: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Exactly one candidate was installed; every thread saw that one.
        let first = winners[0];
        assert!(winners.iter().all(|&w| w == first));
        assert_eq!(store.try_get(&key), Some(first));
    }
}
