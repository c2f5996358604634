use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::{QueryError, QueryResult};

/// A unit of work that can be executed through the cache.
///
/// Implementors only have to describe their identity: [`write_key`] writes a
/// stable canonical form of everything that distinguishes one computation
/// from another. Two queries that write the same text are treated as the same
/// work and share one cached outcome.
///
/// Volatile metadata, such as a creation timestamp, must stay out of the key.
///
/// [`write_key`]: Query::write_key
pub trait Query: Clone + Send + Sync + 'static {
    /// Writes the stable canonical form of this query into the builder.
    ///
    /// The text should be human readable, as it is retained verbatim for
    /// debugging, but above all it has to be *stable*: no addresses, no
    /// timestamps, no map iteration order.
    fn write_key(&self, builder: &mut CacheKeyBuilder) -> fmt::Result;
}

/// A builder for [`CacheKey`]s.
///
/// The builder implements [`fmt::Write`], so queries can construct their
/// canonical form with ordinary [`write!`] calls. The accumulated text is
/// hashed into the key and kept alongside it as metadata.
#[derive(Debug, Default)]
pub struct CacheKeyBuilder {
    metadata: String,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes the [`CacheKey`].
    pub fn build(self) -> CacheKey {
        let hash = Sha256::digest(&self.metadata);
        let hash = <[u8; 32]>::try_from(hash).expect("sha256 outputs 32 bytes");
        CacheKey {
            metadata: self.metadata.into(),
            hash,
        }
    }
}

impl fmt::Write for CacheKeyBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.metadata.write_str(s)
    }
}

/// The cache identity of a query.
///
/// Equality and hashing are based purely on the digest of the canonical text
/// written by [`Query::write_key`]. The text itself is retained as
/// [`metadata`](Self::metadata) so logs and debuggers can tell what a key
/// stands for, but it takes no part in comparisons.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    metadata: Arc<str>,
    hash: [u8; 32],
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.hash {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Builds the key identifying `query`.
    ///
    /// The only way this fails is an implementation of [`Query::write_key`]
    /// returning an error of its own. That is reported as an
    /// [`Inconsistency`](QueryError::Inconsistency) rather than swallowed: a
    /// partially written key could collide with a different query's.
    pub fn from_query<Q: Query>(query: &Q) -> QueryResult<Self> {
        let mut builder = CacheKeyBuilder::new();
        query
            .write_key(&mut builder)
            .map_err(|_| QueryError::Inconsistency("cache key could not be built".into()))?;
        Ok(builder.build())
    }

    /// The human-readable canonical text this key was built from.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Creates a [`CacheKey`] directly from a metadata string, bypassing the
    /// builder.
    #[cfg(any(feature = "test", test))]
    pub fn for_testing(metadata: impl Into<String>) -> Self {
        let builder = CacheKeyBuilder {
            metadata: metadata.into(),
        };
        builder.build()
    }
}
