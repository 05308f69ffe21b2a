use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateToggleParams, Page, PageRequest, RepoError, TogglesRepo, TogglesWriteRepo,
        UpdateToggleParams,
    },
    domain::{entities::ToggleRecord, types::ValueType},
};

use super::{PostgresRepositories, map_sqlx_error};

const TOGGLE_COLUMNS: &str = "id, key, name, description, value, value_type, is_active, \
    created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ToggleRow {
    id: Uuid,
    key: String,
    name: String,
    description: Option<String>,
    value: String,
    value_type: ValueType,
    is_active: bool,
    created_by: Uuid,
    updated_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ToggleRow> for ToggleRecord {
    fn from(row: ToggleRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            name: row.name,
            description: row.description,
            value: row.value,
            value_type: row.value_type,
            is_active: row.is_active,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TogglesRepo for PostgresRepositories {
    async fn find_active_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError> {
        let sql = format!("SELECT {TOGGLE_COLUMNS} FROM toggles WHERE key = $1 AND is_active");
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(ToggleRecord::from))
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError> {
        let sql = format!("SELECT {TOGGLE_COLUMNS} FROM toggles WHERE key = $1");
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(ToggleRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ToggleRecord>, RepoError> {
        let sql = format!("SELECT {TOGGLE_COLUMNS} FROM toggles WHERE id = $1");
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(ToggleRecord::from))
    }

    async fn list_active(&self) -> Result<Vec<ToggleRecord>, RepoError> {
        let sql = format!(
            "SELECT {TOGGLE_COLUMNS} FROM toggles WHERE is_active ORDER BY LOWER(name), key"
        );
        let rows = sqlx::query_as::<_, ToggleRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(ToggleRecord::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<ToggleRecord>, RepoError> {
        let sql = format!("SELECT {TOGGLE_COLUMNS} FROM toggles ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, ToggleRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(ToggleRecord::from).collect())
    }

    async fn list_page(&self, page: PageRequest) -> Result<Page<ToggleRecord>, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM toggles")
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        let sql = format!(
            "SELECT {TOGGLE_COLUMNS} FROM toggles \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        let offset = i64::try_from(page.offset()).map_err(|_| RepoError::InvalidInput {
            message: "page offset out of range".to_string(),
        })?;
        let rows = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(i64::from(page.limit))
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(Page {
            items: rows.into_iter().map(ToggleRecord::from).collect(),
            total: total.max(0) as u64,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TogglesWriteRepo for PostgresRepositories {
    async fn create_toggle(&self, params: CreateToggleParams) -> Result<ToggleRecord, RepoError> {
        let CreateToggleParams {
            key,
            name,
            description,
            value,
            value_type,
            is_active,
            actor,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let sql = format!(
            "INSERT INTO toggles ( \
                id, key, name, description, value, value_type, is_active, \
                created_by, updated_by, created_at, updated_at \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $9) \
             RETURNING {TOGGLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(id)
            .bind(key)
            .bind(name)
            .bind(description)
            .bind(value)
            .bind(value_type)
            .bind(is_active)
            .bind(actor)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ToggleRecord::from(row))
    }

    async fn update_toggle(&self, params: UpdateToggleParams) -> Result<ToggleRecord, RepoError> {
        let UpdateToggleParams {
            id,
            name,
            description,
            value,
            value_type,
            actor,
        } = params;

        let sql = format!(
            "UPDATE toggles \
             SET name = $2, description = $3, value = $4, value_type = $5, \
                 updated_by = $6, updated_at = now() \
             WHERE id = $1 \
             RETURNING {TOGGLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(value)
            .bind(value_type)
            .bind(actor)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ToggleRecord::from(row))
    }

    async fn set_toggle_active(
        &self,
        id: Uuid,
        is_active: bool,
        actor: Uuid,
    ) -> Result<ToggleRecord, RepoError> {
        let sql = format!(
            "UPDATE toggles \
             SET is_active = $2, updated_by = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING {TOGGLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(id)
            .bind(is_active)
            .bind(actor)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ToggleRecord::from(row))
    }

    async fn delete_toggle(&self, id: Uuid) -> Result<ToggleRecord, RepoError> {
        let sql = format!("DELETE FROM toggles WHERE id = $1 RETURNING {TOGGLE_COLUMNS}");
        let row = sqlx::query_as::<_, ToggleRow>(&sql)
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(ToggleRecord::from(row))
    }
}
