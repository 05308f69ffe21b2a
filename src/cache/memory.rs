//! In-process toggle cache.
//!
//! A bounded LRU of resolved views, each stamped with an expiry. One instance is owned
//! by the resolver and shared through `Arc`; the mutex is never held across an await.

use std::{sync::Mutex, time::Duration};

use lru::LruCache;
use tokio::time::Instant;

use crate::domain::view::ToggleView;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::memory";

#[derive(Debug, Clone)]
struct Entry {
    view: ToggleView,
    expires_at: Instant,
}

pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
            default_ttl: config.memory_ttl(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fetch a live entry. Expired entries are evicted and reported as absent.
    pub fn get(&self, key: &str) -> Option<ToggleView> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.view.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, view: ToggleView, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        mutex_lock(&self.entries, SOURCE, "set").put(key.to_string(), Entry { view, expires_at });
    }

    /// Remove one key; absent keys are ignored.
    pub fn delete(&self, key: &str) {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
    }

    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
