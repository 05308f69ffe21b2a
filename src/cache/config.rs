//! Cache configuration.
//!
//! Controls the in-process tier and the `Cache-Control` lifetimes advertised to browsers
//! and the CDN via the `[cache]` table of `toggleboard.toml`.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

const DEFAULT_MEMORY_TTL_SECS: u64 = 300;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_BROWSER_TTL_SECS: u64 = 300;
const DEFAULT_EDGE_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of an in-process entry.
    pub memory_ttl_secs: u64,
    /// Maximum keys held in process before LRU eviction.
    pub memory_capacity: usize,
    /// `max-age` advertised on public responses.
    pub browser_ttl_secs: u64,
    /// `s-maxage` advertised on public responses.
    pub edge_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl_secs: DEFAULT_MEMORY_TTL_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            browser_ttl_secs: DEFAULT_BROWSER_TTL_SECS,
            edge_ttl_secs: DEFAULT_EDGE_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            memory_ttl_secs: settings.memory_ttl.as_secs(),
            memory_capacity: settings.memory_capacity.get(),
            browser_ttl_secs: settings.browser_ttl.as_secs(),
            edge_ttl_secs: settings.edge_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// `Cache-Control` value for public toggle responses.
    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={}, s-maxage={}",
            self.browser_ttl_secs, self.edge_ttl_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_ttl(), Duration::from_secs(300));
        assert_eq!(config.memory_capacity, 10_000);
        assert_eq!(config.cache_control(), "public, max-age=300, s-maxage=3600");
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
