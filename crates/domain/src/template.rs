use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeviceConfiguration;
use crate::error::{ConfigError, Result};

/// Where a template applies in the layering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateScope {
    /// Fleet-wide baseline
    Global,
    /// Operator-defined device group
    Group,
    /// Tied to one hardware model
    DeviceType,
}

impl TemplateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Group => "group",
            Self::DeviceType => "device_type",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Self::Global),
            "group" => Ok(Self::Group),
            "device_type" => Ok(Self::DeviceType),
            other => Err(ConfigError::InvalidScope(other.to_string())),
        }
    }
}

/// A reusable configuration layer.
///
/// IDs are assigned by the store and stable afterwards; names are globally
/// unique. `device_type` is required exactly when scope is `DeviceType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub scope: TemplateScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub config: DeviceConfiguration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template fields supplied by the operator; id and timestamps come from
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub scope: TemplateScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub config: DeviceConfiguration,
}

impl NewTemplate {
    /// Enforce the scope/device_type pairing rules.
    pub fn validate_scope(&self) -> Result<()> {
        match self.scope {
            TemplateScope::DeviceType => {
                if self
                    .device_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|dt| !dt.is_empty())
                    .is_none()
                {
                    return Err(ConfigError::DeviceTypeRequired);
                }
            }
            TemplateScope::Global | TemplateScope::Group => {
                if self.device_type.is_some() {
                    return Err(ConfigError::InvalidScope(format!(
                        "scope {} does not take a device type",
                        self.scope.as_str()
                    )));
                }
            }
        }
        Ok(())
    }
}
