//! Toggle cache tiers.
//!
//! - **Memory**: bounded, TTL-stamped LRU inside the serving process.
//! - **Edge**: durable JSON objects in an object store, fronted by a CDN and purged
//!   explicitly on writes.
//!
//! ```toml
//! [cache]
//! memory_ttl_seconds = 300
//! memory_capacity = 10000
//! browser_ttl_seconds = 300
//! edge_ttl_seconds = 3600
//! ```

mod config;
pub mod edge;
mod lock;
mod memory;

pub use config::CacheConfig;
pub use edge::{
    CdnError, CdnInvalidator, EdgeCache, EdgeError, JSON_CONTENT_TYPE, ObjectStore, StorageError,
};
pub(crate) use lock::{mutex_lock, rw_read, rw_write};
pub use memory::MemoryCache;
