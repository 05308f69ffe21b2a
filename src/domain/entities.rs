//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{RolloutStrategy, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRecord {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    /// Stored string encoding of the value; see [`crate::domain::value`].
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub is_active: bool,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutRecord {
    pub id: Uuid,
    pub toggle_id: Uuid,
    pub strategy: RolloutStrategy,
    pub percentage: i32,
    pub is_active: bool,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RolloutRecord {
    /// Whether this rollout narrows evaluation to a percentage bucket.
    pub fn gates_percentage(&self) -> bool {
        self.is_active && self.strategy == RolloutStrategy::Percentage
    }
}
