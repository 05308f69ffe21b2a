use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{
    CreateRolloutParams, RepoError, RolloutsRepo, RolloutsWriteRepo, TogglesRepo,
    UpdateRolloutParams,
};
use crate::application::resolver::{MutationKind, Resolver};
use crate::domain::entities::{RolloutRecord, ToggleRecord};
use crate::domain::error::DomainError;
use crate::domain::rollout::Percentage;
use crate::domain::types::RolloutStrategy;

const SOURCE: &str = "toggleboard::application::admin::rollouts";

#[derive(Debug, Error)]
pub enum AdminRolloutError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("rollout not found")]
    NotFound,
    #[error("toggle not found")]
    ToggleNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateRolloutCommand {
    pub toggle_id: Uuid,
    pub strategy: RolloutStrategy,
    pub percentage: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateRolloutCommand {
    pub id: Uuid,
    pub strategy: RolloutStrategy,
    pub percentage: i64,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct AdminRolloutService {
    toggles: Arc<dyn TogglesRepo>,
    reader: Arc<dyn RolloutsRepo>,
    writer: Arc<dyn RolloutsWriteRepo>,
    resolver: Arc<Resolver>,
}

impl AdminRolloutService {
    pub fn new(
        toggles: Arc<dyn TogglesRepo>,
        reader: Arc<dyn RolloutsRepo>,
        writer: Arc<dyn RolloutsWriteRepo>,
        resolver: Arc<Resolver>,
    ) -> Self {
        Self {
            toggles,
            reader,
            writer,
            resolver,
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<RolloutRecord, AdminRolloutError> {
        self.reader
            .find_rollout(id)
            .await?
            .ok_or(AdminRolloutError::NotFound)
    }

    pub async fn list_for_toggle(
        &self,
        toggle_id: Uuid,
    ) -> Result<Vec<RolloutRecord>, AdminRolloutError> {
        self.require_toggle(toggle_id).await?;
        self.reader
            .list_for_toggle(toggle_id)
            .await
            .map_err(AdminRolloutError::from)
    }

    pub async fn create_rollout(
        &self,
        actor: Uuid,
        command: CreateRolloutCommand,
    ) -> Result<RolloutRecord, AdminRolloutError> {
        let percentage = Percentage::new(command.percentage)?;
        let toggle = self.require_toggle(command.toggle_id).await?;

        let params = CreateRolloutParams {
            toggle_id: toggle.id,
            strategy: command.strategy,
            percentage: percentage.into(),
            is_active: command.is_active,
            actor,
        };
        let rollout = self.writer.create_rollout(params).await?;
        self.reconcile(&toggle.key, actor).await;
        Ok(rollout)
    }

    pub async fn update_rollout(
        &self,
        actor: Uuid,
        command: UpdateRolloutCommand,
    ) -> Result<RolloutRecord, AdminRolloutError> {
        let percentage = Percentage::new(command.percentage)?;
        let params = UpdateRolloutParams {
            id: command.id,
            strategy: command.strategy,
            percentage: percentage.into(),
            is_active: command.is_active,
            actor,
        };
        let rollout = self
            .writer
            .update_rollout(params)
            .await
            .map_err(not_found_as_missing)?;
        self.reconcile_toggle(rollout.toggle_id, actor).await;
        Ok(rollout)
    }

    pub async fn set_percentage(
        &self,
        actor: Uuid,
        id: Uuid,
        percentage: i64,
    ) -> Result<RolloutRecord, AdminRolloutError> {
        let percentage = Percentage::new(percentage)?;
        let rollout = self
            .writer
            .set_rollout_percentage(id, percentage.into(), actor)
            .await
            .map_err(not_found_as_missing)?;
        self.reconcile_toggle(rollout.toggle_id, actor).await;
        Ok(rollout)
    }

    pub async fn delete_rollout(
        &self,
        actor: Uuid,
        id: Uuid,
    ) -> Result<RolloutRecord, AdminRolloutError> {
        let rollout = self
            .writer
            .delete_rollout(id)
            .await
            .map_err(not_found_as_missing)?;
        self.reconcile_toggle(rollout.toggle_id, actor).await;
        Ok(rollout)
    }

    async fn require_toggle(&self, toggle_id: Uuid) -> Result<ToggleRecord, AdminRolloutError> {
        self.toggles
            .find_by_id(toggle_id)
            .await?
            .ok_or(AdminRolloutError::ToggleNotFound)
    }

    /// Runs after the rollout write has committed, so it never fails the request.
    async fn reconcile_toggle(&self, toggle_id: Uuid, actor: Uuid) {
        match self.toggles.find_by_id(toggle_id).await {
            Ok(Some(toggle)) => self.reconcile(&toggle.key, actor).await,
            // Deleted in the meantime; its own delete path reconciled the caches.
            Ok(None) => {}
            Err(err) => warn!(
                target = SOURCE,
                toggle_id = %toggle_id,
                error = %err,
                "owning toggle lookup failed after rollout write; caches left to expire"
            ),
        }
    }

    async fn reconcile(&self, key: &str, actor: Uuid) {
        self.resolver
            .apply_mutation(key, MutationKind::RolloutChanged, &actor.to_string())
            .await;
    }
}

fn not_found_as_missing(err: RepoError) -> AdminRolloutError {
    match err {
        RepoError::NotFound => AdminRolloutError::NotFound,
        other => AdminRolloutError::Repo(other),
    }
}
