//! # Cache-aside query execution
//!
//! This module executes [`Query`]s through a [`QueryProvider`] while
//! transparently caching the computations, not just their results, in a
//! pluggable [store](stores::CacheStore).
//!
//! ## How a request flows
//!
//! A call to [`QueryExecutor::execute_with`] first derives the query's
//! [`CacheKey`] from its stable canonical form. Depending on the
//! [`EntryPolicy`] it then consults the store, which holds [`QueryCell`]s:
//! lazily started, memoized computations. Installing an unstarted cell and
//! awaiting whichever cell ended up under the key is what coalesces
//! concurrent callers onto a single provider invocation; a candidate cell
//! that loses the installation race is dropped without ever having run.
//!
//! Outcomes are terminal: both the computed item and the [`QueryError`]
//! explaining its absence are cached and replayed to later callers. A cached
//! failure can instead be discarded and queried again when the policy asks
//! for that, which is the default.
//!
//! Cancellation is waiter-scoped. Cancelling the token passed into
//! [`QueryExecutor::execute_with`] abandons that caller's wait; a published
//! computation keeps running for everyone else, and its outcome still lands
//! in the cache.
//!
//! ## Batches
//!
//! An [`AggregateQuery`] fans a list of child queries out through a regular
//! executor via [`AggregateExecutor`], merging the results back into the
//! batch's original order and failing fast on the first child error. The
//! children are cached individually; the batch itself never is.

mod aggregate;
mod cache_key;
mod cell;
mod executor;
mod policy;
mod query_error;

pub mod stores;


pub use aggregate::{AggregateExecutor, AggregateQuery, QueryFinished};
pub use cache_key::{CacheKey, CacheKeyBuilder, Query};
pub use cell::QueryCell;
pub use executor::{QueryExecutor, QueryProvider};
pub use policy::{EntryPolicy, Expiration};
pub use query_error::{QueryError, QueryResult};
