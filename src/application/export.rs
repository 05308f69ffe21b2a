//! Full toggle export, used for the rolling backup object and the `export` command.

use std::{path::Path, sync::Arc};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::{
    application::repos::{RepoError, TogglesRepo},
    cache::{JSON_CONTENT_TYPE, ObjectStore, StorageError},
    domain::{entities::ToggleRecord, types::ValueType},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to format export timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleExport {
    pub exported_at: String,
    pub exported_by: String,
    pub toggles: Vec<ExportedToggle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedToggle {
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub is_active: bool,
    pub key: String,
}

impl From<ToggleRecord> for ExportedToggle {
    fn from(record: ToggleRecord) -> Self {
        Self {
            name: record.name,
            description: record.description,
            value: record.value,
            value_type: record.value_type,
            is_active: record.is_active,
            key: record.key,
        }
    }
}

pub struct ExportService {
    toggles: Arc<dyn TogglesRepo>,
    store: Option<Arc<dyn ObjectStore>>,
    object_path: String,
}

impl ExportService {
    pub fn new(
        toggles: Arc<dyn TogglesRepo>,
        store: Option<Arc<dyn ObjectStore>>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            toggles,
            store,
            object_path: object_path.into(),
        }
    }

    /// Snapshot every toggle, active or not, straight from the database.
    pub async fn snapshot(&self, exported_by: &str) -> Result<ToggleExport, ExportError> {
        let toggles = self.toggles.list_all().await?;
        Ok(ToggleExport {
            exported_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
            exported_by: exported_by.to_string(),
            toggles: toggles.into_iter().map(ExportedToggle::from).collect(),
        })
    }

    /// Overwrite the backup object. A missing store makes this a no-op.
    pub async fn export_to_store(&self, exported_by: &str) -> Result<(), ExportError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let export = self.snapshot(exported_by).await?;
        let body = serde_json::to_vec_pretty(&export)?;
        store
            .put(&self.object_path, Bytes::from(body), JSON_CONTENT_TYPE)
            .await?;
        info!(
            target = "toggleboard::export",
            path = %self.object_path,
            count = export.toggles.len(),
            "backup export written"
        );
        Ok(())
    }

    pub async fn export_to_file(&self, path: &Path, exported_by: &str) -> Result<usize, ExportError> {
        let export = self.snapshot(exported_by).await?;
        let body = serde_json::to_vec_pretty(&export)?;
        tokio::fs::write(path, body).await?;
        Ok(export.toggles.len())
    }
}
