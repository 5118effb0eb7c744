//! Query cache configuration.
//!
//! Controls freshness and garbage collection of query entries via the
//! `[cache]` table of `storefront.toml`.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which fresh data is considered stale. `None` keeps entries
    /// fresh until they are invalidated.
    pub stale_time_ms: Option<u64>,
    /// How long an entry without subscribers survives before collection.
    pub gc_time_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: None,
            gc_time_ms: DEFAULT_GC_TIME_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            stale_time_ms: settings.stale_time.map(millis),
            gc_time_ms: millis(settings.gc_time),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl CacheConfig {
    pub fn stale_time(&self) -> Option<Duration> {
        self.stale_time_ms.map(Duration::from_millis)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }
}
