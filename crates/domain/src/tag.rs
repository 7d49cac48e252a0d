use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form label attached to a device. Tags group devices for queries
/// and policy filters; they never participate in the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTag {
    pub device_id: String,
    pub tag: String,
    pub created_at: DateTime<Utc>,
}

impl DeviceTag {
    pub fn new(device_id: impl Into<String>, tag: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            tag: tag.into(),
            created_at: at,
        }
    }
}
