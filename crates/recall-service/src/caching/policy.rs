use std::time::{Duration, SystemTime};

/// When a cached entry should expire.
///
/// At most one mode applies per entry. [`StoreDefault`](Self::StoreDefault)
/// defers the decision to the store it is written into, see
/// [`CacheConfig`](crate::config::CacheConfig).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expiration {
    /// Use whatever defaults the store is configured with.
    #[default]
    StoreDefault,
    /// Evict at a fixed point in wall-clock time, regardless of access.
    At(SystemTime),
    /// Evict a fixed duration after the entry is written, regardless of
    /// access.
    After(Duration),
    /// Evict once the entry has gone unaccessed for the given duration. Every
    /// access starts the window over.
    Sliding(Duration),
}

/// Cache behavior for a single `execute` call.
///
/// The three flags are free to combine; each combination is meaningful. The
/// common ones have shorthands: [`DEFAULT`](Self::DEFAULT) is the full
/// cache-aside behavior, [`EMPTY`](Self::EMPTY) bypasses the cache entirely.
///
/// Expiration can only be set through the builder methods, which reject
/// degenerate values up front. An entry's expiration is fixed by the policy
/// of the call that wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPolicy {
    /// Consult the store before executing.
    pub lookup_cache: bool,
    /// Publish the computation so later and concurrent callers share it.
    pub save_to_cache: bool,
    /// If the store holds a failed outcome, discard it and run the query
    /// again instead of replaying the failure.
    pub requery_when_error_cached: bool,
    expiration: Expiration,
}

impl EntryPolicy {
    /// Look up, save, and re-run cached failures, expiring per the store's
    /// defaults.
    pub const DEFAULT: Self = Self {
        lookup_cache: true,
        save_to_cache: true,
        requery_when_error_cached: true,
        expiration: Expiration::StoreDefault,
    };

    /// Bypass the cache entirely: no lookup, no save.
    pub const EMPTY: Self = Self {
        lookup_cache: false,
        save_to_cache: false,
        requery_when_error_cached: false,
        expiration: Expiration::StoreDefault,
    };

    /// The expiration an entry written under this policy gets.
    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Expire the written entry at a fixed point in wall-clock time.
    ///
    /// A deadline already in the past makes the entry expire immediately.
    pub fn expire_at(mut self, deadline: SystemTime) -> Self {
        self.expiration = Expiration::At(deadline);
        self
    }

    /// Expire the written entry `ttl` after the write.
    ///
    /// Panics if `ttl` is zero.
    pub fn expire_after(mut self, ttl: Duration) -> Self {
        assert!(!ttl.is_zero(), "absolute expiration must be positive");
        self.expiration = Expiration::After(ttl);
        self
    }

    /// Expire the written entry once it has gone unaccessed for `window`.
    ///
    /// Panics if `window` is zero.
    pub fn expire_sliding(mut self, window: Duration) -> Self {
        assert!(!window.is_zero(), "sliding expiration must be positive");
        self.expiration = Expiration::Sliding(window);
        self
    }
}

impl Default for EntryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
