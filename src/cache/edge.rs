//! Durable edge tier: resolved views persisted as JSON objects that a CDN serves.
//!
//! Entries have no expiry. They are overwritten or deleted by the write path, which
//! then asks the CDN to drop its copies of the affected paths.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::view::ToggleView;

const SOURCE: &str = "toggleboard::cache::edge";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object path `{path}` is not allowed")]
    InvalidPath { path: String },
    #[error("object store I/O failed for `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("object store backend failed: {message}")]
    Backend { message: String },
}

#[derive(Debug, Error)]
#[error("cdn invalidation failed: {message}")]
pub struct CdnError {
    pub message: String,
}

impl CdnError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Blob storage addressed by slash-separated relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// `Ok(None)` when the object does not exist.
    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Explicit purge hook for the CDN fronting the edge objects.
#[async_trait]
pub trait CdnInvalidator: Send + Sync {
    async fn invalidate(&self, paths: &[String]) -> Result<(), CdnError>;
}

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("edge object `{path}` is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode edge object: {0}")]
    Encode(#[source] serde_json::Error),
}

pub struct EdgeCache {
    store: Arc<dyn ObjectStore>,
    cdn: Arc<dyn CdnInvalidator>,
    namespace: String,
}

impl EdgeCache {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cdn: Arc<dyn CdnInvalidator>,
        namespace: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into().trim_matches('/').to_string();
        Self {
            store,
            cdn,
            namespace,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn object_path(&self, key: &str) -> String {
        format!("{}/{key}.json", self.namespace)
    }

    /// Paths the CDN may hold for `key`: the public endpoint and the raw object.
    pub fn cdn_paths(&self, key: &str) -> Vec<String> {
        vec![format!("/toggles/{key}"), format!("/{}", self.object_path(key))]
    }

    pub async fn get(&self, key: &str) -> Result<Option<ToggleView>, EdgeError> {
        let path = self.object_path(key);
        let Some(body) = self.store.get(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| EdgeError::Corrupt { path, source })
    }

    pub async fn put(&self, key: &str, view: &ToggleView) -> Result<(), EdgeError> {
        let path = self.object_path(key);
        let body = serde_json::to_vec(view).map_err(EdgeError::Encode)?;
        self.store
            .put(&path, Bytes::from(body), JSON_CONTENT_TYPE)
            .await?;
        debug!(target = SOURCE, key, path = %path, "edge object written");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), EdgeError> {
        let path = self.object_path(key);
        self.store.delete(&path).await?;
        debug!(target = SOURCE, key, path = %path, "edge object deleted");
        Ok(())
    }

    /// Ask the CDN to drop `paths`. Failures are logged and counted, never returned.
    pub async fn invalidate(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        match self.cdn.invalidate(paths).await {
            Ok(()) => debug!(target = SOURCE, count = paths.len(), "cdn invalidation accepted"),
            Err(err) => {
                counter!(crate::infra::telemetry::CDN_INVALIDATION_FAILED_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    error = %err,
                    paths = ?paths,
                    "cdn invalidation failed; edge copies may be stale until they expire"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{types::ValueType, view::ResolvedToggle};
    use crate::infra::{cdn::RecordingCdnInvalidator, object_store::MemoryObjectStore};

    fn edge() -> (EdgeCache, Arc<MemoryObjectStore>, Arc<RecordingCdnInvalidator>) {
        let store = Arc::new(MemoryObjectStore::default());
        let cdn = Arc::new(RecordingCdnInvalidator::default());
        let cache = EdgeCache::new(store.clone(), cdn.clone(), "/public/toggles/");
        (cache, store, cdn)
    }

    fn enabled(key: &str) -> ToggleView {
        ToggleView::Enabled(ResolvedToggle {
            key: key.to_string(),
            name: "Checkout".to_string(),
            value: json!({"variant": "b"}),
            value_type: ValueType::Json,
        })
    }

    #[test]
    fn paths_follow_namespace() {
        let (cache, _, _) = edge();
        assert_eq!(cache.object_path("checkout"), "public/toggles/checkout.json");
        assert_eq!(
            cache.cdn_paths("checkout"),
            vec![
                "/toggles/checkout".to_string(),
                "/public/toggles/checkout.json".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn missing_object_is_a_miss() {
        let (cache, _, _) = edge();
        assert!(cache.get("absent").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (cache, _, _) = edge();
        cache.put("checkout", &enabled("checkout")).await.expect("put");
        assert_eq!(
            cache.get("checkout").await.expect("get"),
            Some(enabled("checkout"))
        );

        cache.put("gone", &ToggleView::Disabled).await.expect("put");
        assert_eq!(
            cache.get("gone").await.expect("get"),
            Some(ToggleView::Disabled)
        );

        cache.delete("checkout").await.expect("delete");
        assert!(cache.get("checkout").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn corrupt_payload_is_reported() {
        let (cache, store, _) = edge();
        store
            .put(
                "public/toggles/bad.json",
                Bytes::from_static(b"{not json"),
                JSON_CONTENT_TYPE,
            )
            .await
            .expect("put");

        let err = cache.get("bad").await.expect_err("corrupt");
        assert!(matches!(err, EdgeError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn invalidation_failures_are_swallowed() {
        let (cache, _, cdn) = edge();
        cdn.fail_next();
        cache.invalidate(&cache.cdn_paths("checkout")).await;
        cache.invalidate(&cache.cdn_paths("checkout")).await;

        assert_eq!(cdn.batches().len(), 1);
    }
}
