use std::time::{Duration, Instant, SystemTime};

use super::CacheStore;
use crate::caching::CacheKey;
use crate::caching::policy::{EntryPolicy, Expiration};
use crate::config::CacheConfig;

/// An entry's expiration, resolved against the clock at write time.
///
/// [`Expiration`] talks about wall-clock time and store defaults; by the time
/// an entry lands in moka those have been turned into a concrete monotonic
/// deadline, an idle window, or both.
#[derive(Debug, Clone, Copy)]
enum ExpirationTime {
    /// The entry never expires (it can still be evicted for capacity).
    Never,
    /// Evict at this instant, regardless of access.
    At(Instant),
    /// Evict once unaccessed for this long; every access starts the window
    /// over.
    Idle(Duration),
    /// An idle window capped by a hard deadline.
    IdleUntil(Duration, Instant),
}

impl ExpirationTime {
    /// Resolves what expiration an entry written now under `policy` gets.
    ///
    /// A policy that defers to the store inherits the configured defaults;
    /// anything else replaces them outright.
    fn resolve(policy: &EntryPolicy, config: &CacheConfig) -> Self {
        let now = Instant::now();
        match policy.expiration() {
            Expiration::StoreDefault => match (config.time_to_idle, config.time_to_live) {
                (Some(window), Some(ttl)) => Self::IdleUntil(window, now + ttl),
                (Some(window), None) => Self::Idle(window),
                (None, Some(ttl)) => Self::At(now + ttl),
                (None, None) => Self::Never,
            },
            Expiration::At(deadline) => {
                // A deadline already in the past becomes an immediate expiry.
                let remaining = deadline
                    .duration_since(SystemTime::now())
                    .unwrap_or_default();
                Self::At(now + remaining)
            }
            Expiration::After(ttl) => Self::At(now + ttl),
            Expiration::Sliding(window) => Self::Idle(window),
        }
    }
}

/// An entry in the moka cache, remembering how it wants to be expired.
#[derive(Debug, Clone)]
struct StoredEntry<V> {
    value: V,
    expires: ExpirationTime,
}

/// Gives every entry the expiration its write-time policy asked for.
struct PerEntryExpiration;

/// The time from `now` until `deadline`, zero if the deadline has passed.
fn until(deadline: Instant, now: Instant) -> Duration {
    deadline.checked_duration_since(now).unwrap_or_default()
}

impl<V> moka::Expiry<CacheKey, StoredEntry<V>> for PerEntryExpiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &StoredEntry<V>,
        created_at: Instant,
    ) -> Option<Duration> {
        match value.expires {
            ExpirationTime::Never => None,
            ExpirationTime::At(deadline) => Some(until(deadline, created_at)),
            ExpirationTime::Idle(window) => Some(window),
            ExpirationTime::IdleUntil(window, deadline) => {
                Some(window.min(until(deadline, created_at)))
            }
        }
    }

    fn expire_after_read(
        &self,
        _key: &CacheKey,
        value: &StoredEntry<V>,
        read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.expires {
            // Idle windows are renewed by the access; deadlines are not.
            ExpirationTime::Idle(window) => Some(window),
            ExpirationTime::IdleUntil(window, deadline) => {
                Some(window.min(until(deadline, read_at)))
            }
            _ => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        key: &CacheKey,
        value: &StoredEntry<V>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // An overwrite is a fresh write; its policy starts over.
        self.expire_after_create(key, value, updated_at)
    }
}

/// A store backed by a [`moka`] cache.
///
/// Supports everything the richer policies ask for: per-entry absolute and
/// sliding expiration, store-default expiration from [`CacheConfig`], and a
/// capacity bound with LRU-ish eviction. The trade-off is that every write
/// resolves its policy against the clock, so this store is a little heavier
/// than [`ShardedStore`](super::ShardedStore).
pub struct MemoryStore<V> {
    cache: moka::sync::Cache<CacheKey, StoredEntry<V>>,
    config: CacheConfig,
}

impl<V: Clone + Send + Sync + 'static> MemoryStore<V> {
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = moka::sync::Cache::builder().expire_after(PerEntryExpiration);
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        Self {
            cache: builder.build(),
            config,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> for MemoryStore<V> {
    fn try_get(&self, key: &CacheKey) -> Option<V> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn get_or_add(&self, key: &CacheKey, candidate: V, policy: &EntryPolicy) -> V {
        let expires = ExpirationTime::resolve(policy, &self.config);
        self.cache
            .entry(key.clone())
            .or_insert_with(|| StoredEntry {
                value: candidate,
                expires,
            })
            .into_value()
            .value
    }

    fn set(&self, key: &CacheKey, value: V, policy: &EntryPolicy) {
        let expires = ExpirationTime::resolve(policy, &self.config);
        self.cache.insert(key.clone(), StoredEntry { value, expires });
    }

    fn remove(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    fn trim(&self, _pressure: u8) {
        // moka evicts on its own schedule; the closest thing to a trim is
        // running its pending maintenance right now.
        self.cache.run_pending_tasks();
    }

    fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep(ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn unbounded() -> CacheConfig {
        CacheConfig {
            max_capacity: None,
            time_to_live: None,
            time_to_idle: None,
        }
    }

    #[test]
    fn test_get_or_add_keeps_the_first_entry() {
        let store = MemoryStore::new(unbounded());
        let key = CacheKey::for_testing("a");

        assert_eq!(store.try_get(&key), None);
        assert_eq!(store.get_or_add(&key, 1, &EntryPolicy::DEFAULT), 1);
        assert_eq!(store.get_or_add(&key, 2, &EntryPolicy::DEFAULT), 1);
        assert_eq!(store.try_get(&key), Some(1));
    }

    #[test]
    fn test_absolute_expiration() {
        let store = MemoryStore::new(unbounded());
        let key = CacheKey::for_testing("a");
        let policy = EntryPolicy::DEFAULT.expire_after(Duration::from_millis(80));

        store.set(&key, 1, &policy);
        assert_eq!(store.try_get(&key), Some(1));

        // Accesses do not extend an absolute deadline.
        sleep(50);
        assert_eq!(store.try_get(&key), Some(1));
        sleep(50);
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_past_deadline_expires_immediately() {
        let store = MemoryStore::new(unbounded());
        let key = CacheKey::for_testing("a");
        let yesterday = SystemTime::now() - Duration::from_secs(86400);

        store.set(&key, 1, &EntryPolicy::DEFAULT.expire_at(yesterday));
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_sliding_expiration_renews_on_access() {
        let store = MemoryStore::new(unbounded());
        let key = CacheKey::for_testing("a");
        let policy = EntryPolicy::DEFAULT.expire_sliding(Duration::from_millis(100));

        store.set(&key, 1, &policy);

        // Touch the entry well within the window a few times.
        for _ in 0..3 {
            sleep(50);
            assert_eq!(store.try_get(&key), Some(1));
        }

        // After staying idle past the window, the entry is gone.
        sleep(150);
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_store_default_idle_expiration() {
        let config = CacheConfig {
            time_to_idle: Some(Duration::from_millis(80)),
            ..unbounded()
        };
        let store = MemoryStore::new(config);
        let key = CacheKey::for_testing("a");

        store.set(&key, 1, &EntryPolicy::DEFAULT);
        assert_eq!(store.try_get(&key), Some(1));

        sleep(150);
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_per_entry_policy_replaces_store_defaults() {
        let config = CacheConfig {
            time_to_idle: Some(Duration::from_millis(50)),
            ..unbounded()
        };
        let store = MemoryStore::new(config);
        let key = CacheKey::for_testing("a");

        // This entry brings its own absolute deadline, so the store's short
        // idle default does not apply to it.
        let policy = EntryPolicy::DEFAULT.expire_after(Duration::from_millis(200));
        store.set(&key, 1, &policy);

        sleep(100);
        assert_eq!(store.try_get(&key), Some(1));
        sleep(150);
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_store_default_idle_capped_by_ttl() {
        let config = CacheConfig {
            max_capacity: None,
            time_to_live: Some(Duration::from_millis(250)),
            time_to_idle: Some(Duration::from_millis(150)),
        };
        let store = MemoryStore::new(config);
        let key = CacheKey::for_testing("a");

        store.set(&key, 1, &EntryPolicy::DEFAULT);

        // Frequent accesses keep renewing the idle window, but cannot push
        // the entry past its time-to-live.
        sleep(100);
        assert_eq!(store.try_get(&key), Some(1));
        sleep(100);
        assert_eq!(store.try_get(&key), Some(1));
        sleep(100);
        assert_eq!(store.try_get(&key), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = MemoryStore::new(unbounded());
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
}
