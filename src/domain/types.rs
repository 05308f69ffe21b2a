//! Shared domain enumerations aligned with persisted database enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Declared type of a toggle's stored value (mirrors Postgres enum `toggle_value_type`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "toggle_value_type", rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Number => "NUMBER",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Json => "JSON",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(ValueType::String),
            "NUMBER" => Ok(ValueType::Number),
            "BOOLEAN" => Ok(ValueType::Boolean),
            "JSON" => Ok(ValueType::Json),
            other => Err(DomainError::field(
                "type",
                format!("unsupported value type `{other}`"),
            )),
        }
    }
}

/// Rollout strategy (mirrors Postgres enum `rollout_strategy`).
///
/// Only `Percentage` gates evaluation today; the remaining strategies are stored and
/// displayed but resolve as fully on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "rollout_strategy", rename_all = "snake_case")]
pub enum RolloutStrategy {
    #[default]
    Percentage,
    UserBased,
    Geographic,
    TimeBased,
}

impl RolloutStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RolloutStrategy::Percentage => "PERCENTAGE",
            RolloutStrategy::UserBased => "USER_BASED",
            RolloutStrategy::Geographic => "GEOGRAPHIC",
            RolloutStrategy::TimeBased => "TIME_BASED",
        }
    }

    /// Human-facing label used in admin listings.
    pub fn label(self) -> &'static str {
        match self {
            RolloutStrategy::Percentage => "Percentage-based",
            RolloutStrategy::UserBased => "User-based",
            RolloutStrategy::Geographic => "Geographic",
            RolloutStrategy::TimeBased => "Time-based",
        }
    }
}

impl fmt::Display for RolloutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
