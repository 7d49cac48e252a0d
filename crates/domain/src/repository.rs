//! Persistence ports. Implementations live in the infrastructure crate;
//! the service treats stored config blobs as opaque strings (see
//! [`crate::device::DeviceRecord`]).

use async_trait::async_trait;

use crate::device::{DeviceRecord, SyncStatus};
use crate::error::Result;
use crate::report::DriftEvent;
use crate::resolution::{ResolutionHistoryEntry, ResolutionPolicy, ResolutionRequest};
use crate::tag::DeviceTag;
use crate::template::{NewTemplate, Template, TemplateScope};

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Insert and assign a stable id.
    async fn create(&self, template: NewTemplate) -> Result<Template>;
    async fn update(&self, template: &Template) -> Result<()>;
    async fn find_by_id(&self, id: u32) -> Result<Option<Template>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Template>>;
    async fn find_all(&self) -> Result<Vec<Template>>;
    async fn find_by_scope(&self, scope: TemplateScope) -> Result<Vec<Template>>;
    async fn find_by_device_type(&self, device_type: &str) -> Result<Vec<Template>>;
    async fn delete(&self, id: u32) -> Result<()>;
}

#[async_trait]
pub trait DeviceConfigRepository: Send + Sync {
    async fn find_by_id(&self, device_id: &str) -> Result<Option<DeviceRecord>>;
    async fn find_all(&self) -> Result<Vec<DeviceRecord>>;
    /// Devices whose ordered template list contains the given id.
    async fn find_referencing_template(&self, template_id: u32) -> Result<Vec<DeviceRecord>>;
    async fn update_templates(&self, device_id: &str, template_ids: &str) -> Result<()>;
    async fn update_overrides(&self, device_id: &str, overrides: &str) -> Result<()>;
    async fn update_desired_config(&self, device_id: &str, desired: &str) -> Result<()>;
    async fn set_config_applied(&self, device_id: &str, applied: bool) -> Result<()>;
    async fn set_sync_status(&self, device_id: &str, status: SyncStatus) -> Result<()>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn add(&self, tag: &DeviceTag) -> Result<()>;
    async fn remove(&self, device_id: &str, tag: &str) -> Result<()>;
    async fn find_for_device(&self, device_id: &str) -> Result<Vec<DeviceTag>>;
    async fn find_all_tags(&self) -> Result<Vec<String>>;
    async fn find_devices_with_tag(&self, tag: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ResolutionRepository: Send + Sync {
    async fn list_policies(&self) -> Result<Vec<ResolutionPolicy>>;
    async fn save_policy(&self, policy: &ResolutionPolicy) -> Result<()>;

    async fn save_request(&self, request: &ResolutionRequest) -> Result<()>;
    async fn find_request(&self, id: &str) -> Result<Option<ResolutionRequest>>;
    async fn find_pending_requests(&self) -> Result<Vec<ResolutionRequest>>;
    async fn find_requests_for_device(&self, device_id: &str) -> Result<Vec<ResolutionRequest>>;

    async fn append_history(&self, entry: &ResolutionHistoryEntry) -> Result<()>;
    async fn find_history_for_device(&self, device_id: &str)
        -> Result<Vec<ResolutionHistoryEntry>>;

    async fn append_drift_event(&self, event: &DriftEvent) -> Result<()>;
}
