//! Helpers for testing the recall crates.
//!
//! When writing tests, put the following look at the beginning of the test to get
//! readable tracing output:
//!
//! ```rust
//! recall_test::setup();
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup function that is only run once, even if called multiple times.
///
/// Captures trace output from the service crate and mutes everything else, so
/// failing tests print what the engine was doing.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("recall_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Awaits `fut` and returns its output along with how long the wait took.
///
/// Used by tests that assert on latency, for example that a cache hit comes
/// back well before the provider's artificial delay would have elapsed.
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let started = Instant::now();
    let output = fut.await;
    (output, started.elapsed())
}
