//! In-memory repository implementations.
//!
//! Used by tests and by embedded deployments that do not want a database;
//! the semantics mirror the Postgres implementations, including template
//! id assignment and name uniqueness.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use domain::device::{DeviceRecord, SyncStatus};
use domain::error::{ConfigError, Result};
use domain::report::DriftEvent;
use domain::repository::{
    DeviceConfigRepository, ResolutionRepository, TagRepository, TemplateRepository,
};
use domain::resolution::{ResolutionHistoryEntry, ResolutionPolicy, ResolutionRequest};
use domain::tag::DeviceTag;
use domain::template::{NewTemplate, Template, TemplateScope};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryTemplateRepository {
    templates: RwLock<HashMap<u32, Template>>,
    next_id: AtomicU32,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn create(&self, template: NewTemplate) -> Result<Template> {
        let mut templates = self.templates.write().await;
        if templates.values().any(|t| t.name == template.name) {
            return Err(ConfigError::TemplateNameTaken(template.name));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let created = Template {
            id,
            name: template.name,
            description: template.description,
            scope: template.scope,
            device_type: template.device_type,
            config: template.config,
            created_at: now,
            updated_at: now,
        };
        templates.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, template: &Template) -> Result<()> {
        let mut templates = self.templates.write().await;
        if !templates.contains_key(&template.id) {
            return Err(ConfigError::TemplateNotFound(template.id));
        }
        templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: u32) -> Result<Option<Template>> {
        Ok(self.templates.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Template>> {
        Ok(self
            .templates
            .read()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Template>> {
        let mut all: Vec<Template> = self.templates.read().await.values().cloned().collect();
        all.sort_by_key(|t| t.id);
        Ok(all)
    }

    async fn find_by_scope(&self, scope: TemplateScope) -> Result<Vec<Template>> {
        let mut matching: Vec<Template> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| t.scope == scope)
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.id);
        Ok(matching)
    }

    async fn find_by_device_type(&self, device_type: &str) -> Result<Vec<Template>> {
        let mut matching: Vec<Template> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| t.device_type.as_deref() == Some(device_type))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.id);
        Ok(matching)
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.templates
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(ConfigError::TemplateNotFound(id))
    }
}

#[derive(Default)]
pub struct MemoryDeviceRepository {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a device the way discovery would.
    pub async fn insert(&self, record: DeviceRecord) {
        self.devices.write().await.insert(record.id.clone(), record);
    }

    async fn mutate<F>(&self, device_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut DeviceRecord),
    {
        let mut devices = self.devices.write().await;
        let record = devices
            .get_mut(device_id)
            .ok_or_else(|| ConfigError::DeviceNotFound(device_id.to_string()))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl DeviceConfigRepository for MemoryDeviceRepository {
    async fn find_by_id(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<DeviceRecord>> {
        let mut all: Vec<DeviceRecord> = self.devices.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn find_referencing_template(&self, template_id: u32) -> Result<Vec<DeviceRecord>> {
        let devices = self.devices.read().await;
        let mut referencing = Vec::new();
        for record in devices.values() {
            if record.decoded_template_ids()?.contains(&template_id) {
                referencing.push(record.clone());
            }
        }
        referencing.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(referencing)
    }

    async fn update_templates(&self, device_id: &str, template_ids: &str) -> Result<()> {
        self.mutate(device_id, |r| r.template_ids = template_ids.to_string())
            .await
    }

    async fn update_overrides(&self, device_id: &str, overrides: &str) -> Result<()> {
        self.mutate(device_id, |r| r.overrides = overrides.to_string())
            .await
    }

    async fn update_desired_config(&self, device_id: &str, desired: &str) -> Result<()> {
        self.mutate(device_id, |r| r.desired_config = desired.to_string())
            .await
    }

    async fn set_config_applied(&self, device_id: &str, applied: bool) -> Result<()> {
        self.mutate(device_id, |r| r.config_applied = applied).await
    }

    async fn set_sync_status(&self, device_id: &str, status: SyncStatus) -> Result<()> {
        self.mutate(device_id, |r| r.sync_status = status).await
    }
}

#[derive(Default)]
pub struct MemoryTagRepository {
    tags: RwLock<Vec<DeviceTag>>,
}

impl MemoryTagRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagRepository for MemoryTagRepository {
    async fn add(&self, tag: &DeviceTag) -> Result<()> {
        let mut tags = self.tags.write().await;
        if !tags
            .iter()
            .any(|t| t.device_id == tag.device_id && t.tag == tag.tag)
        {
            tags.push(tag.clone());
        }
        Ok(())
    }

    async fn remove(&self, device_id: &str, tag: &str) -> Result<()> {
        self.tags
            .write()
            .await
            .retain(|t| !(t.device_id == device_id && t.tag == tag));
        Ok(())
    }

    async fn find_for_device(&self, device_id: &str) -> Result<Vec<DeviceTag>> {
        Ok(self
            .tags
            .read()
            .await
            .iter()
            .filter(|t| t.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn find_all_tags(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tags.read().await.iter().map(|t| t.tag.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn find_devices_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .tags
            .read()
            .await
            .iter()
            .filter(|t| t.tag == tag)
            .map(|t| t.device_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[derive(Default)]
pub struct MemoryResolutionRepository {
    policies: RwLock<Vec<ResolutionPolicy>>,
    requests: RwLock<HashMap<String, ResolutionRequest>>,
    history: RwLock<Vec<ResolutionHistoryEntry>>,
    drift_events: RwLock<Vec<DriftEvent>>,
}

impl MemoryResolutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn drift_events(&self) -> Vec<DriftEvent> {
        self.drift_events.read().await.clone()
    }
}

#[async_trait]
impl ResolutionRepository for MemoryResolutionRepository {
    async fn list_policies(&self) -> Result<Vec<ResolutionPolicy>> {
        Ok(self.policies.read().await.clone())
    }

    async fn save_policy(&self, policy: &ResolutionPolicy) -> Result<()> {
        let mut policies = self.policies.write().await;
        if let Some(existing) = policies.iter_mut().find(|p| p.id == policy.id) {
            *existing = policy.clone();
        } else {
            policies.push(policy.clone());
        }
        Ok(())
    }

    async fn save_request(&self, request: &ResolutionRequest) -> Result<()> {
        self.requests
            .write()
            .await
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_request(&self, id: &str) -> Result<Option<ResolutionRequest>> {
        Ok(self.requests.read().await.get(id).cloned())
    }

    async fn find_pending_requests(&self) -> Result<Vec<ResolutionRequest>> {
        let mut pending: Vec<ResolutionRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.status == domain::resolution::RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn find_requests_for_device(&self, device_id: &str) -> Result<Vec<ResolutionRequest>> {
        let mut matching: Vec<ResolutionRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn append_history(&self, entry: &ResolutionHistoryEntry) -> Result<()> {
        self.history.write().await.push(entry.clone());
        Ok(())
    }

    async fn find_history_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<ResolutionHistoryEntry>> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn append_drift_event(&self, event: &DriftEvent) -> Result<()> {
        self.drift_events.write().await.push(event.clone());
        Ok(())
    }
}

/// Bundle of all in-memory repositories sharing no state, convenient for
/// wiring a whole service in tests.
pub struct MemoryStore {
    pub templates: Arc<MemoryTemplateRepository>,
    pub devices: Arc<MemoryDeviceRepository>,
    pub tags: Arc<MemoryTagRepository>,
    pub resolutions: Arc<MemoryResolutionRepository>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(MemoryTemplateRepository::new()),
            devices: Arc::new(MemoryDeviceRepository::new()),
            tags: Arc::new(MemoryTagRepository::new()),
            resolutions: Arc::new(MemoryResolutionRepository::new()),
        }
    }

    /// A blank device record ready for seeding.
    pub fn blank_device(id: &str, device_type: &str) -> DeviceRecord {
        DeviceRecord {
            id: id.to_string(),
            device_type: device_type.to_string(),
            template_ids: String::new(),
            overrides: String::new(),
            desired_config: String::new(),
            config_applied: false,
            sync_status: SyncStatus::Unknown,
            updated_at: Utc::now(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
