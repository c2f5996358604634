//! Pluggable cache backends.
//!
//! Stores are dumb key→value maps; everything clever (laziness, coalescing,
//! policies) lives above them. What a store must get right is the atomicity
//! of [`get_or_add`](CacheStore::get_or_add): when two callers race on the
//! same key, exactly one candidate wins and both callers see it.
//!
//! Four backends are provided. [`ShardedStore`] is the usual choice for
//! concurrent workloads, [`MemoryStore`] adds capacity limits and
//! expiration, [`SimpleStore`] is a single-lock map, and [`NoopStore`] turns
//! caching off without changing any call sites.

use crate::caching::CacheKey;
use crate::caching::policy::EntryPolicy;

mod memory;
mod noop;
mod sharded;
mod simple;

pub use memory::MemoryStore;
pub use noop::NoopStore;
pub use sharded::ShardedStore;
pub use simple::SimpleStore;

/// A thread-safe key→value mapping used to cache query computations.
///
/// Implementations are free to drop entries whenever they like (capacity,
/// expiration, [`trim`](Self::trim)); callers treat any lookup as fallible.
/// They must never hand out a value under a key it was not stored under.
pub trait CacheStore<V>: Send + Sync {
    /// Looks up the entry under `key` without creating anything.
    fn try_get(&self, key: &CacheKey) -> Option<V>;

    /// Returns the entry under `key`, installing `candidate` if there is
    /// none.
    ///
    /// Atomic with respect to concurrent `get_or_add` and `set` calls for
    /// the same key: when an entry already exists it is returned unchanged
    /// and `candidate` is discarded. Callers must therefore not start any
    /// work on `candidate` before this returns it as the winner.
    fn get_or_add(&self, key: &CacheKey, candidate: V, policy: &EntryPolicy) -> V;

    /// Unconditionally overwrites the entry under `key`.
    fn set(&self, key: &CacheKey, value: V, policy: &EntryPolicy);

    /// Drops the entry under `key`. Backends without removal support ignore
    /// this.
    fn remove(&self, _key: &CacheKey) {}

    /// Hints the store to shed entries because memory is tight.
    ///
    /// `pressure` is a rough percentage of how much should go. How much
    /// actually goes is up to the backend, including nothing at all.
    fn trim(&self, _pressure: u8) {}

    /// Drops all entries. Backends without support ignore this.
    fn clear(&self) {}
}
