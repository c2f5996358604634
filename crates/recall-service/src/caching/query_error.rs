use thiserror::Error;

/// Errors that can happen while executing or caching a query.
///
/// This is the one error type the engine surfaces, and it doubles as cache
/// content: a failed outcome is a terminal state like any other, so the type
/// is `Clone` and `Eq` and a cached failure can be replayed to later callers
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The underlying work itself failed.
    ///
    /// Carries the provider's own message, handed to callers unchanged.
    #[error("query failed: {0}")]
    Failed(String),

    /// The caller's wait was cancelled, or the computation was lost before it
    /// could produce an outcome.
    #[error("query was cancelled")]
    Cancelled,

    /// The cache layer violated an integrity expectation, for example a key
    /// that could not be built or an aggregate slot that was never filled.
    ///
    /// Never eligible for re-query.
    #[error("cache inconsistency: {0}")]
    Inconsistency(String),

    /// The query asks for a form of execution this engine cannot dispatch.
    #[error("unsupported composition: {0}")]
    UnsupportedComposition(String),
}

impl QueryError {
    /// Whether a cached outcome carrying this error may be discarded and the
    /// query run again under [`EntryPolicy::requery_when_error_cached`].
    ///
    /// Plain failures and cancellations are worth another attempt. Integrity
    /// and composition errors are not: re-running would hit the very same
    /// condition.
    ///
    /// [`EntryPolicy::requery_when_error_cached`]: crate::caching::EntryPolicy
    pub fn is_requeryable(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled)
    }

    /// Turns any [`std::error::Error`] into a [`QueryError::Failed`],
    /// logging it with its full source chain along the way.
    #[track_caller]
    pub fn from_std_error<E: std::error::Error + 'static>(e: E) -> Self {
        let dynerr: &dyn std::error::Error = &e; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr);
        Self::Failed(e.to_string())
    }
}

/// The typed result of a query computation.
///
/// The `Ok` value is the computed item; the `Err` value explains why there is
/// none. Both sides are cacheable terminal states.
pub type QueryResult<T = ()> = Result<T, QueryError>;
