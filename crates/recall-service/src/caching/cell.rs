use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};

use super::{QueryError, QueryResult};

/// The running side of a cell: a shareable channel that resolves to the
/// producer's outcome.
type OutcomeChannel<T> = Shared<oneshot::Receiver<QueryResult<T>>>;

enum State<T> {
    /// The producer has not been started yet.
    ///
    /// The `Option` is only `None` transiently, while the starting observer
    /// holds the lock and takes the future out.
    Unstarted(Option<BoxFuture<'static, QueryResult<T>>>),
    /// The producer is running (or done) on its own task; observers await
    /// clones of this channel.
    Started(OutcomeChannel<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    outcome: OnceLock<QueryResult<T>>,
}

/// A lazily started, memoized unit of asynchronous work.
///
/// The wrapped producer future runs at most once, kicked off by the first
/// [`get`](Self::get) on any handle. It runs on its own spawned task, so it
/// keeps making progress even when every observer stops waiting; a cell that
/// is created but never awaited does no work at all. Once the producer
/// finishes, its outcome is memoized and every current and future observer
/// receives a clone of it.
///
/// This is the unit that cache stores hold: installing an unstarted cell is
/// cheap, losing an installation race discards the candidate without side
/// effects, and awaiting an installed cell coalesces every caller onto the
/// same computation.
pub struct QueryCell<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryCell<T> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for QueryCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.outcome.get() {
            Some(Ok(_)) => "completed",
            Some(Err(_)) => "failed",
            None => match self.inner.state.try_lock().as_deref() {
                Ok(State::Unstarted(_)) => "unstarted",
                _ => "running",
            },
        };
        f.debug_struct("QueryCell").field("state", &state).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCell<T> {
    /// Creates a cell over `producer` without starting it.
    pub fn new<F>(producer: F) -> Self
    where
        F: Future<Output = QueryResult<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Unstarted(Some(producer.boxed()))),
                outcome: OnceLock::new(),
            }),
        }
    }

    /// Waits for the cell's terminal outcome, starting the producer if no
    /// observer has done so yet.
    ///
    /// Dropping the returned future abandons this observer's wait only; the
    /// producer task is unaffected.
    pub async fn get(&self) -> QueryResult<T> {
        let channel = self.force();
        match channel.await {
            Ok(outcome) => outcome,
            // The producer task went away without sending an outcome, which
            // happens when the runtime shuts down underneath it. Settle the
            // cell so `peek` agrees with what observers were told.
            Err(_closed) => self
                .inner
                .outcome
                .get_or_init(|| Err(QueryError::Cancelled))
                .clone(),
        }
    }

    /// Starts the producer if needed and returns the shared outcome channel.
    ///
    /// Deliberately not `async`: the producer is spawned before this returns,
    /// so the computation makes progress even if the channel is never
    /// awaited.
    fn force(&self) -> OutcomeChannel<T> {
        let mut state = self.inner.state.lock().unwrap();
        match &mut *state {
            State::Started(channel) => channel.clone(),
            State::Unstarted(producer) => {
                let producer = producer.take().expect("unstarted cell holds its producer");
                let (sender, receiver) = oneshot::channel();
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let result = producer.await;
                    // Memoize before waking observers, so a `peek` racing the
                    // wakeup never misses a finished outcome.
                    inner.outcome.set(result.clone()).ok();
                    sender.send(result).ok();
                });
                let channel = receiver.shared();
                *state = State::Started(channel.clone());
                channel
            }
        }
    }

    /// The terminal outcome, if the producer has already finished.
    ///
    /// Never starts the producer and never blocks.
    pub fn peek(&self) -> Option<&QueryResult<T>> {
        self.inner.outcome.get()
    }

    /// Whether the cell has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    /// Whether two handles share the same underlying computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
