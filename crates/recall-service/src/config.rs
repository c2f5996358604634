use std::time::Duration;

use serde::Deserialize;

/// Store-wide defaults for the in-memory cache.
///
/// These only apply to entries whose policy leaves expiration at
/// [`Expiration::StoreDefault`](crate::caching::Expiration::StoreDefault); an
/// entry written with its own expiration ignores them entirely.
///
/// Durations are parsed in a human-friendly format, such as `15s` or `5m`.
#[derive(Debug, Clone, Copy, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// The maximum number of entries the store keeps before evicting, if any.
    pub max_capacity: Option<u64>,
    /// Evict entries this long after they were written, regardless of access.
    #[serde(with = "humantime_serde")]
    pub time_to_live: Option<Duration>,
    /// Evict entries once they have gone unaccessed for this long.
    #[serde(with = "humantime_serde")]
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: None,
            time_to_live: None,
            time_to_idle: Some(Duration::from_secs(60)),
        }
    }
}
