//! Per-identity evaluation of a toggle against its percentage rollouts.
//!
//! The gating percentage is cached per key next to the memory tier, stamped with the
//! resolver's write generation. Rollout writes reconcile the owning toggle, which moves
//! the generation and retires the entry; other processes see the change within the
//! memory TTL.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;

use crate::application::repos::{RolloutsRepo, TogglesRepo};
use crate::application::resolver::{CacheTier, ResolveError, Resolver};
use crate::cache::{CacheConfig, mutex_lock};
use crate::domain::rollout::is_in_rollout;
use crate::domain::view::ToggleView;

const SOURCE: &str = "toggleboard::application::evaluation";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub key: String,
    pub identity: String,
    pub enabled: bool,
    pub in_rollout: bool,
    /// Percentage of the gating rollout, absent when the toggle is not gated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i32>,
    #[serde(skip)]
    pub tier: Option<CacheTier>,
}

#[derive(Debug, Clone, Copy)]
struct CachedGate {
    generation: u64,
    percentage: Option<i32>,
    expires_at: Instant,
}

pub struct EvaluationService {
    resolver: Arc<Resolver>,
    toggles: Arc<dyn TogglesRepo>,
    rollouts: Arc<dyn RolloutsRepo>,
    gates: Mutex<LruCache<String, CachedGate>>,
    gate_ttl: Duration,
}

impl EvaluationService {
    pub fn new(
        resolver: Arc<Resolver>,
        toggles: Arc<dyn TogglesRepo>,
        rollouts: Arc<dyn RolloutsRepo>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            resolver,
            toggles,
            rollouts,
            gates: Mutex::new(LruCache::new(cache.memory_capacity_non_zero())),
            gate_ttl: cache.memory_ttl(),
        }
    }

    /// Disabled toggles are never in rollout. An enabled toggle is gated by its first
    /// active percentage rollout; without one it is on for everybody.
    pub async fn evaluate(&self, key: &str, identity: &str) -> Result<Evaluation, ResolveError> {
        let resolution = self.resolver.resolve(key).await?;
        let mut evaluation = Evaluation {
            key: key.to_string(),
            identity: identity.to_string(),
            enabled: resolution.view.is_enabled(),
            in_rollout: false,
            percentage: None,
            tier: Some(resolution.tier),
        };

        if let ToggleView::Disabled = resolution.view {
            return Ok(evaluation);
        }

        match self.gate(key).await? {
            Some(percentage) => {
                evaluation.percentage = Some(percentage);
                evaluation.in_rollout = is_in_rollout(identity, percentage.into());
            }
            None => evaluation.in_rollout = true,
        }
        Ok(evaluation)
    }

    /// Percentage of the first active percentage rollout of `key`, `None` when ungated.
    async fn gate(&self, key: &str) -> Result<Option<i32>, ResolveError> {
        let generation = self.resolver.generation(key);
        if let Some(percentage) = self.cached_gate(key, generation) {
            return Ok(percentage);
        }

        let percentage = match self.toggles.find_active_by_key(key).await? {
            Some(toggle) => self
                .rollouts
                .list_for_toggle(toggle.id)
                .await?
                .into_iter()
                .find(|rollout| rollout.gates_percentage())
                .map(|rollout| rollout.percentage),
            None => None,
        };

        // Stamped with the generation seen before the reads; a write that overlapped
        // them has already moved it on, so this entry is never served.
        mutex_lock(&self.gates, SOURCE, "store_gate").put(
            key.to_string(),
            CachedGate {
                generation,
                percentage,
                expires_at: Instant::now() + self.gate_ttl,
            },
        );
        Ok(percentage)
    }

    fn cached_gate(&self, key: &str, generation: u64) -> Option<Option<i32>> {
        let mut gates = mutex_lock(&self.gates, SOURCE, "cached_gate");
        match gates.get(key).copied() {
            Some(gate) if gate.generation == generation && gate.expires_at > Instant::now() => {
                Some(gate.percentage)
            }
            Some(_) => {
                gates.pop(key);
                None
            }
            None => None,
        }
    }
}
