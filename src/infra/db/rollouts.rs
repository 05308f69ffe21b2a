use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateRolloutParams, RepoError, RolloutsRepo, RolloutsWriteRepo, UpdateRolloutParams,
    },
    domain::{entities::RolloutRecord, types::RolloutStrategy},
};

use super::{PostgresRepositories, map_sqlx_error};

const ROLLOUT_COLUMNS: &str = "id, toggle_id, strategy, percentage, is_active, \
    created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RolloutRow {
    id: Uuid,
    toggle_id: Uuid,
    strategy: RolloutStrategy,
    percentage: i32,
    is_active: bool,
    created_by: Uuid,
    updated_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<RolloutRow> for RolloutRecord {
    fn from(row: RolloutRow) -> Self {
        Self {
            id: row.id,
            toggle_id: row.toggle_id,
            strategy: row.strategy,
            percentage: row.percentage,
            is_active: row.is_active,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RolloutsRepo for PostgresRepositories {
    async fn find_rollout(&self, id: Uuid) -> Result<Option<RolloutRecord>, RepoError> {
        let sql = format!("SELECT {ROLLOUT_COLUMNS} FROM rollouts WHERE id = $1");
        let row = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(RolloutRecord::from))
    }

    async fn list_for_toggle(&self, toggle_id: Uuid) -> Result<Vec<RolloutRecord>, RepoError> {
        let sql = format!(
            "SELECT {ROLLOUT_COLUMNS} FROM rollouts WHERE toggle_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(toggle_id)
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(RolloutRecord::from).collect())
    }
}

#[async_trait]
impl RolloutsWriteRepo for PostgresRepositories {
    async fn create_rollout(
        &self,
        params: CreateRolloutParams,
    ) -> Result<RolloutRecord, RepoError> {
        let CreateRolloutParams {
            toggle_id,
            strategy,
            percentage,
            is_active,
            actor,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let sql = format!(
            "INSERT INTO rollouts ( \
                id, toggle_id, strategy, percentage, is_active, \
                created_by, updated_by, created_at, updated_at \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $7) \
             RETURNING {ROLLOUT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(id)
            .bind(toggle_id)
            .bind(strategy)
            .bind(percentage)
            .bind(is_active)
            .bind(actor)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(RolloutRecord::from(row))
    }

    async fn update_rollout(
        &self,
        params: UpdateRolloutParams,
    ) -> Result<RolloutRecord, RepoError> {
        let UpdateRolloutParams {
            id,
            strategy,
            percentage,
            is_active,
            actor,
        } = params;

        let sql = format!(
            "UPDATE rollouts \
             SET strategy = $2, percentage = $3, is_active = $4, \
                 updated_by = $5, updated_at = now() \
             WHERE id = $1 \
             RETURNING {ROLLOUT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(id)
            .bind(strategy)
            .bind(percentage)
            .bind(is_active)
            .bind(actor)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(RolloutRecord::from(row))
    }

    async fn set_rollout_percentage(
        &self,
        id: Uuid,
        percentage: i32,
        actor: Uuid,
    ) -> Result<RolloutRecord, RepoError> {
        let sql = format!(
            "UPDATE rollouts \
             SET percentage = $2, updated_by = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING {ROLLOUT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(id)
            .bind(percentage)
            .bind(actor)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(RolloutRecord::from(row))
    }

    async fn delete_rollout(&self, id: Uuid) -> Result<RolloutRecord, RepoError> {
        let sql = format!("DELETE FROM rollouts WHERE id = $1 RETURNING {ROLLOUT_COLUMNS}");
        let row = sqlx::query_as::<_, RolloutRow>(&sql)
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(RolloutRecord::from(row))
    }
}
