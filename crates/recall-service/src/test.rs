//! Helpers for testing the query engine.
//!
//! This module is gated behind the `test` feature (or `cfg(test)`) and
//! provides ready-made queries and providers with observable behavior, plus
//! everything from the `recall-test` crate.
//!
//! When writing tests, put the following line at the beginning of the test to
//! get readable tracing output:
//!
//! ```rust,ignore
//! test::setup();
//! ```

use std::fmt::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::caching::{CacheKeyBuilder, Query, QueryError, QueryProvider, QueryResult};

pub use recall_test::*;

/// A query asking for `left + right`, computed after an artificial delay.
///
/// The delay is part of the cache identity, since it changes how the work
/// behaves. The creation timestamp is not: two `AddQuery`s built at different
/// times for the same sum are the same work and share a cache entry.
#[derive(Debug, Clone)]
pub struct AddQuery {
    pub left: i32,
    pub right: i32,
    pub delay: Duration,
    pub created_at: SystemTime,
}

impl AddQuery {
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left,
            right,
            delay: Duration::ZERO,
            created_at: SystemTime::now(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Query for AddQuery {
    fn write_key(&self, builder: &mut CacheKeyBuilder) -> fmt::Result {
        write!(
            builder,
            "add: {} + {} (delay {}ms)",
            self.left,
            self.right,
            self.delay.as_millis()
        )
    }
}

/// Adds the two sides of an [`AddQuery`] after its delay, counting every
/// actual invocation.
///
/// Clones share the counter, so a test can keep one handle for assertions
/// and move another into the executor.
#[derive(Clone, Default)]
pub struct AddProvider {
    computations: Arc<AtomicUsize>,
}

impl AddProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often `perform` has been invoked so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }
}

impl QueryProvider for AddProvider {
    type Query = AddQuery;
    type Item = i32;

    fn perform<'a>(
        &'a self,
        query: &'a AddQuery,
        _token: CancellationToken,
    ) -> BoxFuture<'a, QueryResult<i32>> {
        self.computations.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            if !query.delay.is_zero() {
                tokio::time::sleep(query.delay).await;
            }
            query
                .left
                .checked_add(query.right)
                .ok_or_else(|| QueryError::Failed("attempt to add with overflow".into()))
        })
    }
}

/// Like [`AddProvider`], but the first `fail_first` invocations fail with a
/// transient error before the provider recovers.
#[derive(Clone)]
pub struct FlakyAddProvider {
    fail_first: usize,
    computations: Arc<AtomicUsize>,
}

impl FlakyAddProvider {
    pub fn new(fail_first: usize) -> Self {
        Self {
            fail_first,
            computations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }
}

impl QueryProvider for FlakyAddProvider {
    type Query = AddQuery;
    type Item = i32;

    fn perform<'a>(
        &'a self,
        query: &'a AddQuery,
        _token: CancellationToken,
    ) -> BoxFuture<'a, QueryResult<i32>> {
        let run = self.computations.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            if !query.delay.is_zero() {
                tokio::time::sleep(query.delay).await;
            }
            if run < self.fail_first {
                return Err(QueryError::Failed("transient failure".into()));
            }
            query
                .left
                .checked_add(query.right)
                .ok_or_else(|| QueryError::Failed("attempt to add with overflow".into()))
        })
    }
}
