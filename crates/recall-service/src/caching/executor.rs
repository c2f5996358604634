use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::cell::QueryCell;
use super::stores::CacheStore;
use super::{CacheKey, EntryPolicy, Query, QueryError, QueryResult};

/// Performs the real work behind a query.
///
/// This is the engine's only required extension point; everything around it
/// (lookup, coalescing, policies, expiration) is provided. A provider must
/// not interact with the cache itself, and the engine never retries it on
/// its own.
pub trait QueryProvider: Send + Sync + 'static {
    type Query: Query;
    type Item: Clone + Send + Sync + 'static;

    /// Computes the result for `query`.
    ///
    /// The token is a best-effort hint that nobody is interested in the
    /// result anymore. For work that is published to the cache it belongs to
    /// the executor, not to any single caller, so it does not fire when one
    /// of several waiters walks away.
    fn perform<'a>(
        &'a self,
        query: &'a Self::Query,
        token: CancellationToken,
    ) -> BoxFuture<'a, QueryResult<Self::Item>>;
}

/// A cache-aside query executor.
///
/// For every call the [`EntryPolicy`] decides whether to consult the store,
/// whether to publish the computation, and whether to discard a cached
/// failure. Concurrent callers for the same key coalesce onto one
/// [`QueryCell`], so the provider runs at most once per key while the entry
/// lives, no matter how many callers pile on.
///
/// The executor is cheap to share behind an [`Arc`]; it is `Sync` and all
/// methods take `&self`.
pub struct QueryExecutor<P: QueryProvider, S> {
    provider: Arc<P>,
    store: S,
    /// Parent of the tokens handed to published computations. Deliberately
    /// detached from any caller, so that cancelling one waiter never aborts
    /// work other callers may still pick up.
    work_token: CancellationToken,
}

impl<P, S> QueryExecutor<P, S>
where
    P: QueryProvider,
    S: CacheStore<QueryCell<P::Item>>,
{
    pub fn new(provider: P, store: S) -> Self {
        Self {
            provider: Arc::new(provider),
            store,
            work_token: CancellationToken::new(),
        }
    }

    /// Executes `query` under [`EntryPolicy::DEFAULT`], without caller-side
    /// cancellation.
    pub async fn execute(&self, query: P::Query) -> QueryResult<P::Item> {
        self.execute_with(query, &EntryPolicy::DEFAULT, CancellationToken::new())
            .await
    }

    /// Executes `query` under `policy`.
    ///
    /// Cancelling `token` makes this caller's wait return
    /// [`QueryError::Cancelled`] promptly. Work shared with or published for
    /// other callers keeps running; only work performed solely for this
    /// caller is dropped along with the wait.
    pub async fn execute_with(
        &self,
        query: P::Query,
        policy: &EntryPolicy,
        token: CancellationToken,
    ) -> QueryResult<P::Item> {
        if token.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let key = CacheKey::from_query(&query)?;

        if !policy.lookup_cache {
            return self.execute_uncached(query, &key, policy, token).await;
        }

        if policy.save_to_cache {
            let candidate = self.new_cell(&query);
            let cell = self.store.get_or_add(&key, candidate.clone(), policy);
            if cell.ptr_eq(&candidate) {
                tracing::trace!(key = %key, "publishing new computation");
            } else {
                tracing::trace!(key = %key, "coalescing onto cached computation");
            }
            if Self::should_requery(&cell, policy) {
                tracing::debug!(key = %key, "discarding cached failure, querying again");
                return self.execute_uncached(query, &key, policy, token).await;
            }
            return wait_on(&cell, &token).await;
        }

        // Lookup without saving: serve an existing entry if there is one,
        // otherwise run the query without touching the store at all.
        match self.store.try_get(&key) {
            Some(cell) if Self::should_requery(&cell, policy) => {
                tracing::debug!(key = %key, "discarding cached failure, querying again");
                self.execute_uncached(query, &key, policy, token).await
            }
            Some(cell) => wait_on(&cell, &token).await,
            None => self.execute_uncached(query, &key, policy, token).await,
        }
    }

    /// Runs `query` as if the cache lookup had missed.
    ///
    /// When the policy saves, a fresh cell is installed over whatever the key
    /// held before it is awaited, so concurrent lookups coalesce onto the new
    /// computation. Otherwise the provider runs inline, on the caller's own
    /// task and under the caller's own token.
    async fn execute_uncached(
        &self,
        query: P::Query,
        key: &CacheKey,
        policy: &EntryPolicy,
        token: CancellationToken,
    ) -> QueryResult<P::Item> {
        if policy.save_to_cache {
            let cell = self.new_cell(&query);
            self.store.set(key, cell.clone(), policy);
            wait_on(&cell, &token).await
        } else {
            tracing::trace!(key = %key, "querying uncached");
            let work = self.provider.perform(&query, token.clone());
            tokio::select! {
                biased;
                result = work => result,
                _ = token.cancelled() => Err(QueryError::Cancelled),
            }
        }
    }

    /// Creates an unstarted cell computing `query`.
    ///
    /// Nothing runs until the cell is first awaited, so a candidate that
    /// loses a `get_or_add` race is dropped without the provider ever seeing
    /// it.
    fn new_cell(&self, query: &P::Query) -> QueryCell<P::Item> {
        let provider = Arc::clone(&self.provider);
        let query = query.clone();
        let token = self.work_token.child_token();
        QueryCell::new(async move { provider.perform(&query, token).await })
    }

    /// Whether a cached entry should be thrown away and queried again.
    ///
    /// Only finished cells holding a re-queryable error qualify; an entry
    /// that is still computing is always waited on.
    fn should_requery(cell: &QueryCell<P::Item>, policy: &EntryPolicy) -> bool {
        policy.requery_when_error_cached
            && matches!(cell.peek(), Some(Err(error)) if error.is_requeryable())
    }
}

/// Awaits the cell's outcome, letting `token` abandon the wait without
/// touching the shared computation.
async fn wait_on<T: Clone + Send + Sync + 'static>(
    cell: &QueryCell<T>,
    token: &CancellationToken,
) -> QueryResult<T> {
    tokio::select! {
        biased;
        outcome = cell.get() => outcome,
        _ = token.cancelled() => Err(QueryError::Cancelled),
    }
}
