use std::sync::Arc;
use std::time::SystemTime;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::cell::QueryCell;
use super::executor::{QueryExecutor, QueryProvider};
use super::stores::CacheStore;
use super::{EntryPolicy, QueryError, QueryResult};

/// An ordered batch of child queries dispatched together.
///
/// Deliberately *not* a [`Query`](super::Query): an aggregate's value is the
/// act of coordinating its children, so the aggregate itself is never looked
/// up or saved in a cache. Its children are executed through a regular
/// executor and cached individually.
#[derive(Debug, Clone)]
pub struct AggregateQuery<Q> {
    children: Vec<Q>,
    export_binary: bool,
    created_at: SystemTime,
}

impl<Q> AggregateQuery<Q> {
    pub fn new(children: Vec<Q>) -> Self {
        Self {
            children,
            export_binary: false,
            created_at: SystemTime::now(),
        }
    }

    /// Marks the batch for backend-side binary export.
    ///
    /// The flag travels with the aggregate for executors that hand the whole
    /// batch to a backend. Client-side fan-out cannot honor it and rejects
    /// such a batch up front.
    pub fn export_binary(mut self, export: bool) -> Self {
        self.export_binary = export;
        self
    }

    pub fn children(&self) -> &[Q] {
        &self.children
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Notification for one successfully finished child of an aggregate.
///
/// Sent from whichever task the child finished on; a receiver wanting to
/// touch non-`Send` state has to hop onto its own context first.
#[derive(Debug, Clone)]
pub struct QueryFinished<Q, T> {
    /// The child's position in the aggregate's original list.
    pub index: usize,
    pub query: Q,
    pub value: T,
}

/// Fans an [`AggregateQuery`] out over a child executor and merges the
/// results.
///
/// Children run concurrently, each through the child executor's full
/// cache-aside path, and their results are slotted back into the batch's
/// original order. The first child to fail fails the whole batch with its
/// own error; the remaining waits are abandoned, though published child
/// computations keep running in the cache.
pub struct AggregateExecutor<P: QueryProvider, S> {
    child: Arc<QueryExecutor<P, S>>,
}

impl<P, S> AggregateExecutor<P, S>
where
    P: QueryProvider,
    S: CacheStore<QueryCell<P::Item>>,
{
    pub fn new(child: Arc<QueryExecutor<P, S>>) -> Self {
        Self { child }
    }

    /// Executes every child and returns their results in the children's
    /// original order.
    pub async fn execute(
        &self,
        aggregate: &AggregateQuery<P::Query>,
        policy: &EntryPolicy,
        token: CancellationToken,
    ) -> QueryResult<Vec<P::Item>> {
        self.dispatch(aggregate, policy, token, None).await
    }

    /// Like [`execute`](Self::execute), additionally sending a
    /// [`QueryFinished`] for every successful child as it completes.
    ///
    /// Notifications arrive in completion order, not batch order, and only
    /// for successes: a failing child fails the batch instead of notifying.
    pub async fn execute_with_progress(
        &self,
        aggregate: &AggregateQuery<P::Query>,
        policy: &EntryPolicy,
        token: CancellationToken,
        progress: UnboundedSender<QueryFinished<P::Query, P::Item>>,
    ) -> QueryResult<Vec<P::Item>> {
        self.dispatch(aggregate, policy, token, Some(progress)).await
    }

    async fn dispatch(
        &self,
        aggregate: &AggregateQuery<P::Query>,
        policy: &EntryPolicy,
        token: CancellationToken,
        progress: Option<UnboundedSender<QueryFinished<P::Query, P::Item>>>,
    ) -> QueryResult<Vec<P::Item>> {
        if aggregate.export_binary {
            return Err(QueryError::UnsupportedComposition(
                "binary-export batches cannot be fanned out client-side".into(),
            ));
        }

        // Children are tagged with their position up front, so two
        // cache-equivalent children still fill their own slots.
        let mut pending: FuturesUnordered<_> = aggregate
            .children
            .iter()
            .enumerate()
            .map(|(index, query)| {
                let child = Arc::clone(&self.child);
                let query = query.clone();
                let policy = *policy;
                let token = token.clone();
                async move {
                    let outcome = child.execute_with(query.clone(), &policy, token).await;
                    (index, query, outcome)
                }
            })
            .collect();

        let mut slots: Vec<Option<P::Item>> = vec![None; aggregate.children.len()];

        // Drain in completion order. The `?` below drops `pending` on the
        // first failure, abandoning the remaining waits.
        while let Some((index, query, outcome)) = pending.next().await {
            let value = outcome?;
            if let Some(progress) = &progress {
                let finished = QueryFinished {
                    index,
                    query,
                    value: value.clone(),
                };
                // A receiver that went away just stops getting updates.
                progress.send(finished).ok();
            }
            slots[index] = Some(value);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    QueryError::Inconsistency(format!("no outcome for sub-query {index}"))
                })
            })
            .collect()
    }
}
