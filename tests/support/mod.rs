//! In-memory stand-ins for the persistence and storage adapters.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use toggleboard::application::admin::rollouts::CreateRolloutCommand;
use toggleboard::application::admin::{AdminRolloutService, AdminToggleService};
use toggleboard::application::evaluation::EvaluationService;
use toggleboard::application::export::ExportService;
use toggleboard::application::repos::{
    CreateRolloutParams, CreateToggleParams, Page, PageRequest, RepoError, RolloutsRepo,
    RolloutsWriteRepo, TogglesRepo, TogglesWriteRepo, UpdateRolloutParams, UpdateToggleParams,
};
use toggleboard::application::resolver::Resolver;
use toggleboard::application::tasks::{TaskQueue, TaskReceiver, TaskWorker};
use toggleboard::cache::{CacheConfig, EdgeCache, MemoryCache};
use toggleboard::domain::entities::{RolloutRecord, ToggleRecord};
use toggleboard::domain::types::{RolloutStrategy, ValueType};
use toggleboard::infra::cdn::RecordingCdnInvalidator;
use toggleboard::infra::http::{AdminState, CdnOrigin, PublicState};
use toggleboard::infra::object_store::MemoryObjectStore;
use uuid::Uuid;

pub const BACKUP_PATH: &str = "toggles-auto-backup.json";

#[derive(Default)]
struct State {
    toggles: Vec<ToggleRecord>,
    rollouts: Vec<RolloutRecord>,
}

/// Thread-safe fake of the Postgres repositories. Counts public lookups and can be
/// told to fail reads to simulate an outage.
#[derive(Default)]
pub struct InMemoryRepo {
    state: Mutex<State>,
    active_lookups: AtomicUsize,
    fail_reads: AtomicBool,
}

impl InMemoryRepo {
    pub fn insert_toggle(
        &self,
        key: &str,
        name: &str,
        value: &str,
        value_type: ValueType,
        is_active: bool,
    ) -> ToggleRecord {
        let now = OffsetDateTime::now_utc();
        let actor = Uuid::new_v4();
        let record = ToggleRecord {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            description: None,
            value: value.to_string(),
            value_type,
            is_active,
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .expect("state lock")
            .toggles
            .push(record.clone());
        record
    }

    pub fn active_lookups(&self) -> usize {
        self.active_lookups.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn rollout_count(&self) -> usize {
        self.state.lock().expect("state lock").rollouts.len()
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl TogglesRepo for InMemoryRepo {
    async fn find_active_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError> {
        self.active_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state
            .toggles
            .iter()
            .find(|toggle| toggle.key == key && toggle.is_active)
            .cloned())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state.toggles.iter().find(|toggle| toggle.key == key).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ToggleRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state.toggles.iter().find(|toggle| toggle.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ToggleRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state
            .toggles
            .iter()
            .filter(|toggle| toggle.is_active)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ToggleRecord>, RepoError> {
        self.check_reads()?;
        Ok(self.state.lock().expect("state lock").toggles.clone())
    }

    async fn list_page(&self, page: PageRequest) -> Result<Page<ToggleRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        let items = state
            .toggles
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            total: state.toggles.len() as u64,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.check_reads()
    }
}

#[async_trait]
impl TogglesWriteRepo for InMemoryRepo {
    async fn create_toggle(&self, params: CreateToggleParams) -> Result<ToggleRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        if state.toggles.iter().any(|toggle| toggle.key == params.key) {
            return Err(RepoError::Duplicate {
                constraint: "toggles_key_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = ToggleRecord {
            id: Uuid::new_v4(),
            key: params.key,
            name: params.name,
            description: params.description,
            value: params.value,
            value_type: params.value_type,
            is_active: params.is_active,
            created_by: params.actor,
            updated_by: params.actor,
            created_at: now,
            updated_at: now,
        };
        state.toggles.push(record.clone());
        Ok(record)
    }

    async fn update_toggle(&self, params: UpdateToggleParams) -> Result<ToggleRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let toggle = state
            .toggles
            .iter_mut()
            .find(|toggle| toggle.id == params.id)
            .ok_or(RepoError::NotFound)?;
        toggle.name = params.name;
        toggle.description = params.description;
        toggle.value = params.value;
        toggle.value_type = params.value_type;
        toggle.updated_by = params.actor;
        toggle.updated_at = OffsetDateTime::now_utc();
        Ok(toggle.clone())
    }

    async fn set_toggle_active(
        &self,
        id: Uuid,
        is_active: bool,
        actor: Uuid,
    ) -> Result<ToggleRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let toggle = state
            .toggles
            .iter_mut()
            .find(|toggle| toggle.id == id)
            .ok_or(RepoError::NotFound)?;
        toggle.is_active = is_active;
        toggle.updated_by = actor;
        toggle.updated_at = OffsetDateTime::now_utc();
        Ok(toggle.clone())
    }

    async fn delete_toggle(&self, id: Uuid) -> Result<ToggleRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let index = state
            .toggles
            .iter()
            .position(|toggle| toggle.id == id)
            .ok_or(RepoError::NotFound)?;
        let removed = state.toggles.remove(index);
        state.rollouts.retain(|rollout| rollout.toggle_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl RolloutsRepo for InMemoryRepo {
    async fn find_rollout(&self, id: Uuid) -> Result<Option<RolloutRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state.rollouts.iter().find(|rollout| rollout.id == id).cloned())
    }

    async fn list_for_toggle(&self, toggle_id: Uuid) -> Result<Vec<RolloutRecord>, RepoError> {
        self.check_reads()?;
        let state = self.state.lock().expect("state lock");
        Ok(state
            .rollouts
            .iter()
            .filter(|rollout| rollout.toggle_id == toggle_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RolloutsWriteRepo for InMemoryRepo {
    async fn create_rollout(
        &self,
        params: CreateRolloutParams,
    ) -> Result<RolloutRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        if !state.toggles.iter().any(|toggle| toggle.id == params.toggle_id) {
            return Err(RepoError::Integrity {
                message: "rollouts_toggle_id_fkey".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let record = RolloutRecord {
            id: Uuid::new_v4(),
            toggle_id: params.toggle_id,
            strategy: params.strategy,
            percentage: params.percentage,
            is_active: params.is_active,
            created_by: params.actor,
            updated_by: params.actor,
            created_at: now,
            updated_at: now,
        };
        state.rollouts.push(record.clone());
        Ok(record)
    }

    async fn update_rollout(
        &self,
        params: UpdateRolloutParams,
    ) -> Result<RolloutRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let rollout = state
            .rollouts
            .iter_mut()
            .find(|rollout| rollout.id == params.id)
            .ok_or(RepoError::NotFound)?;
        rollout.strategy = params.strategy;
        rollout.percentage = params.percentage;
        rollout.is_active = params.is_active;
        rollout.updated_by = params.actor;
        rollout.updated_at = OffsetDateTime::now_utc();
        Ok(rollout.clone())
    }

    async fn set_rollout_percentage(
        &self,
        id: Uuid,
        percentage: i32,
        actor: Uuid,
    ) -> Result<RolloutRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let rollout = state
            .rollouts
            .iter_mut()
            .find(|rollout| rollout.id == id)
            .ok_or(RepoError::NotFound)?;
        rollout.percentage = percentage;
        rollout.updated_by = actor;
        rollout.updated_at = OffsetDateTime::now_utc();
        Ok(rollout.clone())
    }

    async fn delete_rollout(&self, id: Uuid) -> Result<RolloutRecord, RepoError> {
        let mut state = self.state.lock().expect("state lock");
        let index = state
            .rollouts
            .iter()
            .position(|rollout| rollout.id == id)
            .ok_or(RepoError::NotFound)?;
        Ok(state.rollouts.remove(index))
    }
}

/// Fully wired services over in-memory adapters.
pub struct Harness {
    pub repo: Arc<InMemoryRepo>,
    pub store: Arc<MemoryObjectStore>,
    pub cdn: Arc<RecordingCdnInvalidator>,
    pub edge: Arc<EdgeCache>,
    pub memory: Arc<MemoryCache>,
    pub resolver: Arc<Resolver>,
    pub toggles: Arc<AdminToggleService>,
    pub rollouts: Arc<AdminRolloutService>,
    pub evaluation: Arc<EvaluationService>,
    pub cache_config: CacheConfig,
    worker: TaskWorker,
    receiver: TaskReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_queue_capacity(64)
    }

    pub fn with_queue_capacity(capacity: usize) -> Self {
        let repo = Arc::new(InMemoryRepo::default());
        let store = Arc::new(MemoryObjectStore::default());
        let cdn = Arc::new(RecordingCdnInvalidator::default());
        let edge = Arc::new(EdgeCache::new(
            store.clone(),
            cdn.clone(),
            "public/toggles",
        ));
        let cache_config = CacheConfig::default();
        let memory = Arc::new(MemoryCache::new(&cache_config));

        let (tasks, receiver) = TaskQueue::bounded(capacity);
        let resolver = Arc::new(Resolver::new(
            repo.clone(),
            memory.clone(),
            Some(edge.clone()),
            tasks,
        ));
        let exporter = Arc::new(ExportService::new(
            repo.clone(),
            Some(store.clone()),
            BACKUP_PATH,
        ));
        let worker = TaskWorker::new(Some(edge.clone()), Some(exporter));

        let toggles = Arc::new(AdminToggleService::new(
            repo.clone(),
            repo.clone(),
            resolver.clone(),
        ));
        let rollouts = Arc::new(AdminRolloutService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            resolver.clone(),
        ));
        let evaluation = Arc::new(EvaluationService::new(
            resolver.clone(),
            repo.clone(),
            repo.clone(),
            &cache_config,
        ));

        Self {
            repo,
            store,
            cdn,
            edge,
            memory,
            resolver,
            toggles,
            rollouts,
            evaluation,
            cache_config,
            worker,
            receiver,
        }
    }

    /// Run every queued background task to completion. Returns how many were queued.
    pub async fn run_tasks(&mut self) -> usize {
        let tasks = self.receiver.drain_now();
        let count = tasks.len();
        if count > 0 {
            self.worker.process(tasks).await;
        }
        count
    }

    pub fn edge_path(&self, key: &str) -> String {
        self.edge.object_path(key)
    }

    pub fn public_state(&self, cdn: Option<CdnOrigin>) -> PublicState {
        PublicState {
            resolver: self.resolver.clone(),
            evaluation: self.evaluation.clone(),
            toggles: self.repo.clone(),
            cache: self.cache_config.clone(),
            cdn,
        }
    }

    pub fn admin_state(&self) -> AdminState {
        AdminState {
            toggles: self.toggles.clone(),
            rollouts: self.rollouts.clone(),
            resolver: self.resolver.clone(),
            source: self.repo.clone(),
        }
    }
}

pub fn author() -> Uuid {
    Uuid::new_v4()
}

pub fn percentage_rollout(toggle_id: Uuid, percentage: i64) -> CreateRolloutCommand {
    CreateRolloutCommand {
        toggle_id,
        strategy: RolloutStrategy::Percentage,
        percentage,
        is_active: true,
    }
}
