//! The public, cacheable representation of a resolved toggle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{entities::ToggleRecord, types::ValueType, value};

/// Resolved state of a toggle key as public readers see it.
///
/// `Disabled` covers both unknown and inactive keys and is cached like any other
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ViewWire", try_from = "ViewWire")]
pub enum ToggleView {
    Enabled(ResolvedToggle),
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedToggle {
    pub key: String,
    pub name: String,
    pub value: Value,
    pub value_type: ValueType,
}

impl ResolvedToggle {
    pub fn from_record(record: &ToggleRecord) -> Self {
        Self {
            key: record.key.clone(),
            name: record.name.clone(),
            value: value::decode(&record.value, record.value_type),
            value_type: record.value_type,
        }
    }
}

impl ToggleView {
    /// Build the view for a source lookup; `None` and inactive records resolve to disabled.
    pub fn from_source(record: Option<&ToggleRecord>) -> Self {
        match record {
            Some(record) if record.is_active => Self::Enabled(ResolvedToggle::from_record(record)),
            _ => Self::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ToggleView::Enabled(_))
    }

    pub fn as_enabled(&self) -> Option<&ResolvedToggle> {
        match self {
            ToggleView::Enabled(toggle) => Some(toggle),
            ToggleView::Disabled => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ViewWire {
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    value_type: Option<ValueType>,
}

impl From<ToggleView> for ViewWire {
    fn from(view: ToggleView) -> Self {
        match view {
            ToggleView::Enabled(toggle) => ViewWire {
                enabled: true,
                key: Some(toggle.key),
                name: Some(toggle.name),
                value: toggle.value,
                value_type: Some(toggle.value_type),
            },
            ToggleView::Disabled => ViewWire {
                enabled: false,
                key: None,
                name: None,
                value: Value::Null,
                value_type: None,
            },
        }
    }
}

impl TryFrom<ViewWire> for ToggleView {
    type Error = String;

    fn try_from(wire: ViewWire) -> Result<Self, Self::Error> {
        if !wire.enabled {
            return Ok(ToggleView::Disabled);
        }
        match (wire.key, wire.name, wire.value_type) {
            (Some(key), Some(name), Some(value_type)) => {
                Ok(ToggleView::Enabled(ResolvedToggle {
                    key,
                    name,
                    value: wire.value,
                    value_type,
                }))
            }
            _ => Err("enabled toggle view requires key, name and type".to_string()),
        }
    }
}
