use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Result};

/// Device API generation. Gen1 speaks the flat settings endpoint; gen2 and
/// gen3 speak JSON-RPC with the same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    Gen1,
    Gen2,
    Gen3,
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gen1 => "gen1",
            Self::Gen2 => "gen2",
            Self::Gen3 => "gen3",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "gen1" | "1" => Ok(Self::Gen1),
            "gen2" | "2" => Ok(Self::Gen2),
            "gen3" | "3" => Ok(Self::Gen3),
            other => Err(ConfigError::UnsupportedGeneration(other.to_string())),
        }
    }

    /// Gen3 devices speak the gen2 RPC dialect.
    pub fn wire_dialect(&self) -> Self {
        match self {
            Self::Gen1 => Self::Gen1,
            Self::Gen2 | Self::Gen3 => Self::Gen2,
        }
    }
}

/// Identity block reported by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub generation: Generation,
    pub model: String,
    pub firmware: String,
    pub mac: String,
    pub auth_enabled: bool,
}

/// Transport port to one physical device.
///
/// Every call may block on I/O and must honor the caller's cancellation
/// token. Failures surface as wrapped transport errors; this layer never
/// retries.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Identity and capability flags
    async fn get_info(&self, cancel: &CancellationToken) -> Result<DeviceInfo>;

    /// Full configuration as the device's native wire JSON
    async fn get_config(&self, cancel: &CancellationToken) -> Result<Value>;

    /// Push one settings group (wire-dialect payload)
    async fn set_config(
        &self,
        group: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn reboot(&self, cancel: &CancellationToken) -> Result<()>;

    /// Cheap liveness probe
    async fn test_connection(&self, cancel: &CancellationToken) -> Result<()>;

    fn generation(&self) -> Generation;

    /// Network address the client talks to
    fn address(&self) -> &str;
}

/// Builds an independent client per device for fan-out operations.
#[async_trait]
pub trait DeviceClientFactory: Send + Sync {
    async fn client_for(&self, device_id: &str) -> Result<Box<dyn DeviceClient>>;
}
