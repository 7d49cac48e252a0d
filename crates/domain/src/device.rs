use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeviceConfiguration;
use crate::error::{ConfigError, Result};

/// Last known relation between stored and live configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Unknown,
    InSync,
    Drift,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::InSync => "in_sync",
            Self::Drift => "drift",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_sync" => Self::InSync,
            "drift" => Self::Drift,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Config-facing projection of a managed device as the store hands it out.
///
/// `template_ids`, `overrides` and `desired_config` are opaque serialized
/// strings at this level; the decode helpers below own the JSON round trip
/// and treat `""` the same as `"[]"` / `"{}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub device_type: String,
    pub template_ids: String,
    pub overrides: String,
    pub desired_config: String,
    pub config_applied: bool,
    pub sync_status: SyncStatus,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn decoded_template_ids(&self) -> Result<Vec<u32>> {
        decode_template_ids(&self.template_ids)
    }

    pub fn decoded_overrides(&self) -> Result<DeviceConfiguration> {
        decode_config(&self.overrides)
            .map_err(|e| ConfigError::repository("failed to parse stored overrides", e))
    }

    pub fn decoded_desired_config(&self) -> Result<DeviceConfiguration> {
        decode_config(&self.desired_config)
            .map_err(|e| ConfigError::repository("failed to parse stored config", e))
    }

    pub fn has_overrides(&self) -> bool {
        self.decoded_overrides()
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }
}

/// `""` and `"[]"` are both the empty template list.
pub fn decode_template_ids(raw: &str) -> Result<Vec<u32>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| ConfigError::repository("failed to parse template id list", e))
}

pub fn encode_template_ids(ids: &[u32]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

/// `""` and `"{}"` are both the empty configuration.
pub fn decode_config(raw: &str) -> serde_json::Result<DeviceConfiguration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DeviceConfiguration::default());
    }
    serde_json::from_str(trimmed)
}

pub fn encode_config(config: &DeviceConfiguration) -> Result<String> {
    Ok(serde_json::to_string(config)?)
}

/// Snapshot answer for "where does this device stand?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigStatus {
    pub device_id: String,
    pub config_applied: bool,
    pub has_overrides: bool,
    pub template_count: usize,
    pub last_updated: DateTime<Utc>,
}
