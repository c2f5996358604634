use super::CacheStore;
use crate::caching::CacheKey;
use crate::caching::policy::EntryPolicy;

/// A store that never stores anything.
///
/// Lookups always miss and `get_or_add` hands the candidate straight back,
/// so every caller ends up running its own computation. Lets caching be
/// switched off without changing any call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl NoopStore {
    pub fn new() -> Self {
        Self
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for NoopStore {
    fn try_get(&self, _key: &CacheKey) -> Option<V> {
        None
    }

    fn get_or_add(&self, _key: &CacheKey, candidate: V, _policy: &EntryPolicy) -> V {
        candidate
    }

    fn set(&self, _key: &CacheKey, _value: V, _policy: &EntryPolicy) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_sticks() {
        let store = NoopStore::new();
        let key = CacheKey::for_testing("a");

        store.set(&key, 1, &EntryPolicy::DEFAULT);
        assert_eq!(store.try_get(&key), None::<i32>);

        // Every candidate wins, because there is never an existing entry.
        assert_eq!(store.get_or_add(&key, 2, &EntryPolicy::DEFAULT), 2);
        assert_eq!(store.get_or_add(&key, 3, &EntryPolicy::DEFAULT), 3);
        assert_eq!(store.try_get(&key), None::<i32>);

        // The defaulted maintenance hooks are harmless no-ops.
        CacheStore::<i32>::remove(&store, &key);
        CacheStore::<i32>::trim(&store, 100);
        CacheStore::<i32>::clear(&store);
    }
}
