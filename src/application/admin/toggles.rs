use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateToggleParams, Page, PageRequest, RepoError, TogglesRepo, TogglesWriteRepo,
    UpdateToggleParams,
};
use crate::application::resolver::{MutationKind, Resolver};
use crate::domain::entities::ToggleRecord;
use crate::domain::error::DomainError;
use crate::domain::keys::{generate_key, validate_key};
use crate::domain::types::ValueType;
use crate::domain::value;

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum AdminToggleError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("toggle not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateToggleCommand {
    /// Explicit key; generated from the name when absent.
    pub key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub value_type: ValueType,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateToggleCommand {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub value_type: ValueType,
}

/// Admin operations on toggles. Every successful write is followed by the resolver's
/// cache reconciliation for the affected key.
#[derive(Clone)]
pub struct AdminToggleService {
    reader: Arc<dyn TogglesRepo>,
    writer: Arc<dyn TogglesWriteRepo>,
    resolver: Arc<Resolver>,
}

impl AdminToggleService {
    pub fn new(
        reader: Arc<dyn TogglesRepo>,
        writer: Arc<dyn TogglesWriteRepo>,
        resolver: Arc<Resolver>,
    ) -> Self {
        Self {
            reader,
            writer,
            resolver,
        }
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<ToggleRecord>, AdminToggleError> {
        self.reader
            .list_page(page)
            .await
            .map_err(AdminToggleError::from)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<ToggleRecord, AdminToggleError> {
        self.reader
            .find_by_id(id)
            .await?
            .ok_or(AdminToggleError::NotFound)
    }

    pub async fn create_toggle(
        &self,
        actor: Uuid,
        command: CreateToggleCommand,
    ) -> Result<ToggleRecord, AdminToggleError> {
        let CreateToggleCommand {
            key,
            name,
            description,
            value,
            value_type,
            is_active,
        } = command;

        let name = normalize_name(&name)?;
        value::validate(&value, value_type)?;

        let key = match key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            Some(key) => {
                validate_key(&key)?;
                key
            }
            None => generate_key(&name, now_millis()),
        };

        let params = CreateToggleParams {
            key,
            name,
            description: normalize_description(description),
            value,
            value_type,
            is_active,
            actor,
        };

        let toggle = self.writer.create_toggle(params).await?;
        self.resolver
            .apply_mutation(&toggle.key, MutationKind::Created, &actor.to_string())
            .await;
        Ok(toggle)
    }

    pub async fn update_toggle(
        &self,
        actor: Uuid,
        command: UpdateToggleCommand,
    ) -> Result<ToggleRecord, AdminToggleError> {
        let UpdateToggleCommand {
            id,
            name,
            description,
            value,
            value_type,
        } = command;

        let name = normalize_name(&name)?;
        value::validate(&value, value_type)?;

        let params = UpdateToggleParams {
            id,
            name,
            description: normalize_description(description),
            value,
            value_type,
            actor,
        };

        let toggle = self
            .writer
            .update_toggle(params)
            .await
            .map_err(not_found_as_missing)?;
        self.resolver
            .apply_mutation(&toggle.key, MutationKind::Updated, &actor.to_string())
            .await;
        Ok(toggle)
    }

    pub async fn set_active(
        &self,
        actor: Uuid,
        id: Uuid,
        is_active: bool,
    ) -> Result<ToggleRecord, AdminToggleError> {
        let toggle = self
            .writer
            .set_toggle_active(id, is_active, actor)
            .await
            .map_err(not_found_as_missing)?;
        self.resolver
            .apply_mutation(&toggle.key, MutationKind::Updated, &actor.to_string())
            .await;
        Ok(toggle)
    }

    pub async fn delete_toggle(
        &self,
        actor: Uuid,
        id: Uuid,
    ) -> Result<ToggleRecord, AdminToggleError> {
        let toggle = self
            .writer
            .delete_toggle(id)
            .await
            .map_err(not_found_as_missing)?;
        self.resolver
            .apply_mutation(&toggle.key, MutationKind::Deleted, &actor.to_string())
            .await;
        Ok(toggle)
    }
}

fn not_found_as_missing(err: RepoError) -> AdminToggleError {
    match err {
        RepoError::NotFound => AdminToggleError::NotFound,
        other => AdminToggleError::Repo(other),
    }
}

fn normalize_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::field("name", "name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::field(
            "name",
            format!("name must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(normalize_name("  Dark mode ").unwrap(), "Dark mode");
        let err = normalize_name("   ").unwrap_err();
        assert_eq!(err.field_name(), Some("name"));
        assert!(normalize_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn blank_descriptions_become_none() {
        assert_eq!(normalize_description(Some("  ".into())), None);
        assert_eq!(
            normalize_description(Some(" beta ".into())).as_deref(),
            Some("beta")
        );
    }
}
