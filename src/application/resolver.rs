//! Toggle resolution across the memory, edge and database tiers.
//!
//! Reads fall through memory, then edge, then the database, filling the faster tiers on
//! the way back. Writes land in the database first; [`Resolver::apply_mutation`] then
//! refreshes or removes the edge object, evicts the memory entry and schedules the CDN
//! purge and backup export.
//!
//! Every mutation bumps a per-key write generation before its re-read. A read that
//! started under an older generation returns what it found but does not fill either
//! tier, so a slow reader can never park a pre-write view behind a completed write.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::Instant,
};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    application::{
        repos::{RepoError, TogglesRepo},
        tasks::{Task, TaskQueue},
    },
    cache::{EdgeCache, MemoryCache, mutex_lock},
    domain::{keys::validate_key, view::ToggleView},
    infra::telemetry::{
        EDGE_ERROR_TOTAL, EDGE_HIT_TOTAL, EDGE_MISS_TOTAL, MEMORY_HIT_TOTAL, MEMORY_MISS_TOTAL,
        RESOLVE_MS, SOURCE_READ_TOTAL,
    },
};

const SOURCE: &str = "toggleboard::application::resolver";

/// Tier that answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Edge,
    Source,
    /// The key is malformed; no tier was consulted.
    Rejected,
}

impl CacheTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::Memory => "memory",
            CacheTier::Edge => "edge",
            CacheTier::Source => "source",
            CacheTier::Rejected => "rejected",
        }
    }

    /// `hit`/`miss` for the tiers that were consulted, `None` for rejected keys.
    pub fn cache_status(self) -> Option<&'static str> {
        match self {
            CacheTier::Memory | CacheTier::Edge => Some("hit"),
            CacheTier::Source => Some("miss"),
            CacheTier::Rejected => None,
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub view: ToggleView,
    pub tier: CacheTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
    RolloutChanged,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Created => "created",
            MutationKind::Updated => "updated",
            MutationKind::Deleted => "deleted",
            MutationKind::RolloutChanged => "rollout_changed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("toggle source unavailable: {0}")]
    Source(#[from] RepoError),
}

pub struct Resolver {
    source: Arc<dyn TogglesRepo>,
    memory: Arc<MemoryCache>,
    edge: Option<Arc<EdgeCache>>,
    tasks: TaskQueue,
    generations: Mutex<HashMap<String, u64>>,
}

impl Resolver {
    pub fn new(
        source: Arc<dyn TogglesRepo>,
        memory: Arc<MemoryCache>,
        edge: Option<Arc<EdgeCache>>,
        tasks: TaskQueue,
    ) -> Self {
        Self {
            source,
            memory,
            edge,
            tasks,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Write generation of `key`; it changes whenever a mutation of `key` begins.
    pub fn generation(&self, key: &str) -> u64 {
        mutex_lock(&self.generations, SOURCE, "generation")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn bump_generation(&self, key: &str) {
        let mut generations = mutex_lock(&self.generations, SOURCE, "bump_generation");
        *generations.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Resolve the public view of `key`.
    ///
    /// Only a database failure is an error; edge failures degrade to a database read.
    /// Caches are written only after a complete database fetch.
    pub async fn resolve(&self, key: &str) -> Result<Resolution, ResolveError> {
        let started = Instant::now();
        let result = self.resolve_inner(key).await;
        histogram!(RESOLVE_MS).record(started.elapsed().as_secs_f64() * 1_000.0);
        if let Ok(resolution) = &result {
            debug!(
                target = SOURCE,
                key,
                tier = resolution.tier.as_str(),
                enabled = resolution.view.is_enabled(),
                "toggle resolved"
            );
        }
        result
    }

    async fn resolve_inner(&self, key: &str) -> Result<Resolution, ResolveError> {
        if validate_key(key).is_err() {
            // No stored key can match; skip the tiers rather than cache garbage.
            return Ok(Resolution {
                view: ToggleView::Disabled,
                tier: CacheTier::Rejected,
            });
        }

        if let Some(view) = self.memory.get(key) {
            counter!(MEMORY_HIT_TOTAL).increment(1);
            return Ok(Resolution {
                view,
                tier: CacheTier::Memory,
            });
        }
        counter!(MEMORY_MISS_TOTAL).increment(1);

        let generation = self.generation(key);

        if let Some(view) = self.read_edge(key).await {
            self.fill_memory(key, &view, generation);
            return Ok(Resolution {
                view,
                tier: CacheTier::Edge,
            });
        }

        let view = self.read_source(key).await?;
        self.fill_edge(key, &view, generation).await;
        self.fill_memory(key, &view, generation);

        Ok(Resolution {
            view,
            tier: CacheTier::Source,
        })
    }

    /// Reconcile the cache tiers with a write that has already been committed.
    ///
    /// The memory entry is evicted rather than refilled so the next reader takes the
    /// fresh value from the edge or the database. Never fails: a database error during
    /// the forced re-read removes the edge object instead of refreshing it.
    pub async fn apply_mutation(&self, key: &str, kind: MutationKind, actor: &str) {
        self.bump_generation(key);
        let refreshed = match self.read_source(key).await {
            Ok(view) => Some(view),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    mutation = kind.as_str(),
                    error = %err,
                    "re-read after write failed; dropping cached copies"
                );
                None
            }
        };

        match refreshed {
            Some(view @ ToggleView::Enabled(_)) => self.write_edge(key, &view).await,
            Some(ToggleView::Disabled) | None => self.delete_edge(key).await,
        }
        self.memory.delete(key);

        if let Some(edge) = self.edge.as_ref() {
            self.tasks.submit(Task::InvalidateCdn {
                paths: edge.cdn_paths(key),
            });
        }
        self.tasks.submit(Task::Export {
            exported_by: actor.to_string(),
        });

        debug!(
            target = SOURCE,
            key,
            mutation = kind.as_str(),
            "cache tiers reconciled after write"
        );
    }

    /// Evict `keys` from the memory tier, or everything when `None`. Returns the count
    /// of keys named, or the number of entries cleared.
    pub fn purge_memory(&self, keys: Option<&[String]>) -> usize {
        match keys {
            Some(keys) => {
                for key in keys {
                    self.memory.delete(key);
                }
                keys.len()
            }
            None => {
                let cleared = self.memory.len();
                self.memory.clear();
                cleared
            }
        }
    }

    /// Store a read-path view in memory unless a mutation began since `generation`.
    /// The check and the insert share the generation lock, so a concurrent bump
    /// happens either before (the fill is skipped) or after (its eviction wins).
    fn fill_memory(&self, key: &str, view: &ToggleView, generation: u64) {
        let generations = mutex_lock(&self.generations, SOURCE, "fill_memory");
        if generations.get(key).copied().unwrap_or(0) != generation {
            debug!(target = SOURCE, key, "memory fill skipped; key was written meanwhile");
            return;
        }
        self.memory.set(key, view.clone(), self.memory.default_ttl());
    }

    /// Write a read-path view to the edge unless a mutation began since `generation`.
    /// A mutation that begins while the put is in flight may finish first, so the
    /// generation is checked again afterwards and the object dropped if it moved.
    async fn fill_edge(&self, key: &str, view: &ToggleView, generation: u64) {
        if self.generation(key) != generation {
            debug!(target = SOURCE, key, "edge fill skipped; key was written meanwhile");
            return;
        }
        self.write_edge(key, view).await;
        if self.generation(key) != generation {
            debug!(target = SOURCE, key, "edge fill raced a write; dropping object");
            self.delete_edge(key).await;
        }
    }

    async fn read_source(&self, key: &str) -> Result<ToggleView, ResolveError> {
        counter!(SOURCE_READ_TOTAL).increment(1);
        let record = self.source.find_active_by_key(key).await?;
        Ok(ToggleView::from_source(record.as_ref()))
    }

    async fn read_edge(&self, key: &str) -> Option<ToggleView> {
        let edge = self.edge.as_ref()?;
        match edge.get(key).await {
            Ok(Some(view)) => {
                counter!(EDGE_HIT_TOTAL).increment(1);
                Some(view)
            }
            Ok(None) => {
                counter!(EDGE_MISS_TOTAL).increment(1);
                None
            }
            Err(err) => {
                counter!(EDGE_ERROR_TOTAL, "op" => "get").increment(1);
                warn!(target = SOURCE, key, error = %err, "edge read failed; falling through");
                None
            }
        }
    }

    async fn write_edge(&self, key: &str, view: &ToggleView) {
        let Some(edge) = self.edge.as_ref() else {
            return;
        };
        if let Err(err) = edge.put(key, view).await {
            counter!(EDGE_ERROR_TOTAL, "op" => "put").increment(1);
            warn!(target = SOURCE, key, error = %err, "edge write failed");
        }
    }

    async fn delete_edge(&self, key: &str) {
        let Some(edge) = self.edge.as_ref() else {
            return;
        };
        if let Err(err) = edge.delete(key).await {
            counter!(EDGE_ERROR_TOTAL, "op" => "delete").increment(1);
            warn!(target = SOURCE, key, error = %err, "edge delete failed");
        }
    }
}
