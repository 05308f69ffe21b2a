use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::application::repos::Page;
use crate::domain::entities::{RolloutRecord, ToggleRecord};
use crate::domain::rollout::{Percentage, next_step, previous_step, status_color, status_text};
use crate::domain::types::{RolloutStrategy, ValueType};
use crate::domain::value;

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleCreateRequest {
    pub key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub value: Value,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleUpdateRequest {
    pub name: String,
    pub description: Option<String>,
    pub value: Value,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleActiveRequest {
    pub is_active: bool,
}

/// String payloads are taken as the stored encoding; anything else is encoded for
/// the declared type.
pub fn stored_value(payload: &Value, value_type: ValueType) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => value::encode(other, value_type),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ToggleListResponse {
    pub toggles: Vec<ToggleRecord>,
    pub pagination: Pagination,
}

impl From<Page<ToggleRecord>> for ToggleListResponse {
    fn from(page: Page<ToggleRecord>) -> Self {
        let pagination = Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            toggles: page.items,
            pagination,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutCreateRequest {
    pub toggle_id: Uuid,
    #[serde(default)]
    pub strategy: RolloutStrategy,
    pub percentage: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutUpdateRequest {
    #[serde(default)]
    pub strategy: RolloutStrategy,
    pub percentage: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct PercentageRequest {
    pub percentage: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactQuery {
    pub total_users: Option<u64>,
}

/// Rollout record decorated with the display helpers the admin UI renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutView {
    #[serde(flatten)]
    pub rollout: RolloutRecord,
    pub strategy_label: &'static str,
    pub status_text: String,
    pub status_color: &'static str,
    pub next_step: u8,
    pub previous_step: u8,
}

impl From<RolloutRecord> for RolloutView {
    fn from(rollout: RolloutRecord) -> Self {
        let percentage = Percentage::try_from(rollout.percentage).unwrap_or(Percentage::ZERO);
        Self {
            strategy_label: rollout.strategy.label(),
            status_text: status_text(percentage, rollout.is_active),
            status_color: status_color(percentage),
            next_step: next_step(percentage).get(),
            previous_step: previous_step(percentage).get(),
            rollout,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactResponse {
    pub rollout_id: Uuid,
    pub percentage: u8,
    pub total_users: u64,
    pub affected_users: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CachePurgeRequest {
    pub keys: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CachePurgeResponse {
    pub purged: usize,
    pub scope: &'static str,
}
