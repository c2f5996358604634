//! A cache-aside query execution engine.
//!
//! The [`caching`] module is the heart of this crate: it executes
//! [`Query`](caching::Query)s through a [`QueryProvider`](caching::QueryProvider)
//! while transparently coalescing and caching the computations in a pluggable
//! store. See the module docs for how a request flows through the layers.

pub mod caching;
pub mod config;

#[cfg(any(feature = "test", test))]
#[allow(unused)]
pub mod test;
