//! Orchestrator for templates, overrides and desired-config lifecycle.
//!
//! Desired config is never written directly: it is always the merge of
//! the device's ordered templates plus the `device-override` layer, and
//! every write that can change the outcome triggers a recomputation that
//! clears `config_applied` (desired first, flag second, so a crash
//! between the two leaves the device marked dirty rather than clean).

use std::collections::BTreeMap;
use std::sync::Arc;

use domain::DeviceConfiguration;
use domain::clock::Clock;
use domain::device::{ConfigStatus, DeviceRecord, encode_config, encode_template_ids};
use domain::error::{ConfigError, Result};
use domain::repository::{DeviceConfigRepository, TagRepository, TemplateRepository};
use domain::tag::DeviceTag;
use domain::template::{NewTemplate, Template, TemplateScope};
use domain::validation::{ValidationLevel, ValidationResult};
use tracing::{info, warn};

use crate::merge::{ConfigLayer, MergeResult, Merger};
use crate::validate::Validator;

/// Synthetic layer name for per-device overrides
pub const OVERRIDE_LAYER: &str = "device-override";

pub struct ConfigurationService {
    templates: Arc<dyn TemplateRepository>,
    devices: Arc<dyn DeviceConfigRepository>,
    tags: Arc<dyn TagRepository>,
    merger: Merger,
    validator: Validator,
    clock: Arc<dyn Clock>,
}

impl ConfigurationService {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        devices: Arc<dyn DeviceConfigRepository>,
        tags: Arc<dyn TagRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            templates,
            devices,
            tags,
            merger: Merger::new(),
            validator: Validator::new(),
            clock,
        }
    }

    // --- Templates ----------------------------------------------------

    pub async fn create_template(&self, template: NewTemplate) -> Result<Template> {
        template.validate_scope()?;
        if self.templates.find_by_name(&template.name).await?.is_some() {
            return Err(ConfigError::TemplateNameTaken(template.name));
        }
        let created = self.templates.create(template).await?;
        info!(template_id = %created.id, name = %created.name, "template created");
        Ok(created)
    }

    /// Update a template and recompute every device that references it.
    pub async fn update_template(&self, id: u32, update: NewTemplate) -> Result<Template> {
        update.validate_scope()?;
        let existing = self.get_template(id).await?;

        if update.name != existing.name {
            if let Some(other) = self.templates.find_by_name(&update.name).await? {
                if other.id != id {
                    return Err(ConfigError::TemplateNameTaken(update.name));
                }
            }
        }

        let template = Template {
            id,
            name: update.name,
            description: update.description,
            scope: update.scope,
            device_type: update.device_type,
            config: update.config,
            created_at: existing.created_at,
            updated_at: self.clock.now(),
        };
        self.templates.update(&template).await?;
        self.recompute_affected_devices(id).await?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: u32) -> Result<()> {
        let _ = self.get_template(id).await?;
        let referencing = self.devices.find_referencing_template(id).await?;
        if !referencing.is_empty() {
            return Err(ConfigError::TemplateInUse {
                id,
                device_count: referencing.len(),
            });
        }
        self.templates.delete(id).await?;
        info!(template_id = %id, "template deleted");
        Ok(())
    }

    pub async fn get_template(&self, id: u32) -> Result<Template> {
        self.templates
            .find_by_id(id)
            .await?
            .ok_or(ConfigError::TemplateNotFound(id))
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.templates.find_all().await
    }

    pub async fn list_templates_by_scope(&self, scope: TemplateScope) -> Result<Vec<Template>> {
        self.templates.find_by_scope(scope).await
    }

    pub async fn list_templates_for_device_type(&self, device_type: &str) -> Result<Vec<Template>> {
        self.templates.find_by_device_type(device_type).await
    }

    // --- Device template lists ----------------------------------------

    /// Replace the device's ordered template list. Every id must exist.
    pub async fn set_device_templates(&self, device_id: &str, template_ids: &[u32]) -> Result<()> {
        let _ = self.get_device(device_id).await?;

        let mut missing = Vec::new();
        for id in template_ids {
            if self.templates.find_by_id(*id).await?.is_none() {
                missing.push(*id);
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::TemplateIdsNotFound(missing));
        }

        self.devices
            .update_templates(device_id, &encode_template_ids(template_ids))
            .await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    /// Insert a template at a position in the device's list. Negative or
    /// out-of-range positions append; re-adding an existing template is a
    /// no-op.
    pub async fn add_template_to_device(
        &self,
        device_id: &str,
        template_id: u32,
        position: i32,
    ) -> Result<()> {
        let record = self.get_device(device_id).await?;
        let _ = self.get_template(template_id).await?;

        let mut ids = record.decoded_template_ids()?;
        if ids.contains(&template_id) {
            return Ok(());
        }
        insert_at_position(&mut ids, template_id, position);

        self.devices
            .update_templates(device_id, &encode_template_ids(&ids))
            .await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    pub async fn remove_template_from_device(
        &self,
        device_id: &str,
        template_id: u32,
    ) -> Result<()> {
        let record = self.get_device(device_id).await?;
        let mut ids = record.decoded_template_ids()?;
        let before = ids.len();
        ids.retain(|id| *id != template_id);
        if ids.len() == before {
            return Ok(());
        }

        self.devices
            .update_templates(device_id, &encode_template_ids(&ids))
            .await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    // --- Tags ----------------------------------------------------------

    pub async fn add_device_tag(&self, device_id: &str, tag: &str) -> Result<()> {
        let _ = self.get_device(device_id).await?;
        self.tags
            .add(&DeviceTag::new(device_id, tag, self.clock.now()))
            .await
    }

    pub async fn remove_device_tag(&self, device_id: &str, tag: &str) -> Result<()> {
        self.tags.remove(device_id, tag).await
    }

    pub async fn list_device_tags(&self, device_id: &str) -> Result<Vec<DeviceTag>> {
        self.tags.find_for_device(device_id).await
    }

    pub async fn list_all_tags(&self) -> Result<Vec<String>> {
        self.tags.find_all_tags().await
    }

    pub async fn devices_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        self.tags.find_devices_with_tag(tag).await
    }

    // --- Overrides ------------------------------------------------------

    pub async fn set_device_overrides(
        &self,
        device_id: &str,
        overrides: &DeviceConfiguration,
    ) -> Result<()> {
        let _ = self.get_device(device_id).await?;
        self.devices
            .update_overrides(device_id, &encode_config(overrides)?)
            .await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    /// Merge a partial patch over the existing overrides. Tri-state rules
    /// apply: only the leaves the patch sets change.
    pub async fn patch_device_overrides(
        &self,
        device_id: &str,
        patch: &DeviceConfiguration,
    ) -> Result<()> {
        let record = self.get_device(device_id).await?;
        let merged = self.merger.merge_pair(&record.decoded_overrides()?, patch)?;
        self.devices
            .update_overrides(device_id, &encode_config(&merged)?)
            .await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    pub async fn clear_device_overrides(&self, device_id: &str) -> Result<()> {
        let _ = self.get_device(device_id).await?;
        self.devices.update_overrides(device_id, "{}").await?;
        self.recompute_desired_config(device_id).await?;
        Ok(())
    }

    // --- Desired config -------------------------------------------------

    /// The materialized desired config plus a freshly-derived source map.
    /// Merge is deterministic, so the map always describes the stored
    /// config unless a recompute is pending.
    pub async fn get_desired_config(
        &self,
        device_id: &str,
    ) -> Result<(DeviceConfiguration, BTreeMap<String, String>)> {
        let record = self.get_device(device_id).await?;
        let desired = record.decoded_desired_config()?;
        let merged = self.merge_layers(&record).await?;
        Ok((desired, merged.sources))
    }

    /// Recompute the merge and persist it. The desired config lands
    /// before `config_applied` is cleared.
    pub async fn recompute_desired_config(&self, device_id: &str) -> Result<MergeResult> {
        let record = self.get_device(device_id).await?;
        let merged = self.merge_layers(&record).await?;

        self.devices
            .update_desired_config(device_id, &encode_config(&merged.config)?)
            .await?;
        self.devices.set_config_applied(device_id, false).await?;
        info!(
            device_id = %device_id,
            leaves = merged.sources.len(),
            "desired configuration recomputed"
        );
        Ok(merged)
    }

    /// After a template edit, recompute every device that references it.
    /// One device's failure does not stop the sweep.
    pub async fn recompute_affected_devices(&self, template_id: u32) -> Result<usize> {
        let records = self.devices.find_referencing_template(template_id).await?;
        let mut recomputed = 0;
        for record in &records {
            match self.recompute_desired_config(&record.id).await {
                Ok(_) => recomputed += 1,
                Err(e) => {
                    warn!(device_id = %record.id, error = %e, "failed to recompute device")
                }
            }
        }
        info!(
            template_id = %template_id,
            devices = records.len(),
            recomputed = recomputed,
            "recomputed devices referencing template"
        );
        Ok(recomputed)
    }

    /// Validate a device's desired configuration at the given level.
    pub async fn validate_desired_config(
        &self,
        device_id: &str,
        level: ValidationLevel,
    ) -> Result<ValidationResult> {
        let record = self.get_device(device_id).await?;
        Ok(self
            .validator
            .validate(&record.decoded_desired_config()?, level))
    }

    /// Gate for the converge path: refuse to proceed when the desired
    /// configuration fails validation at the given level.
    pub async fn ensure_desired_valid(
        &self,
        device_id: &str,
        level: ValidationLevel,
    ) -> Result<ValidationResult> {
        let result = self.validate_desired_config(device_id, level).await?;
        if !result.valid {
            return Err(ConfigError::ValidationFailed(result));
        }
        Ok(result)
    }

    pub async fn get_config_status(&self, device_id: &str) -> Result<ConfigStatus> {
        let record = self.get_device(device_id).await?;
        Ok(ConfigStatus {
            device_id: record.id.clone(),
            config_applied: record.config_applied,
            has_overrides: record.has_overrides(),
            template_count: record.decoded_template_ids()?.len(),
            last_updated: record.updated_at,
        })
    }

    /// Record the outcome of an apply/verify pass.
    pub async fn set_config_applied(&self, device_id: &str, applied: bool) -> Result<()> {
        let _ = self.get_device(device_id).await?;
        self.devices.set_config_applied(device_id, applied).await
    }

    // --- Internals ------------------------------------------------------

    async fn get_device(&self, device_id: &str) -> Result<DeviceRecord> {
        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| ConfigError::DeviceNotFound(device_id.to_string()))
    }

    /// Layer order: the device's templates in list order, then the
    /// override layer when non-empty. A template whose stored config does
    /// not decode is excluded with a warning; the rest still contribute.
    async fn merge_layers(&self, record: &DeviceRecord) -> Result<MergeResult> {
        let mut layers = Vec::new();
        for template_id in record.decoded_template_ids()? {
            match self.templates.find_by_id(template_id).await {
                Ok(Some(template)) => {
                    layers.push(ConfigLayer::new(template.name.clone(), template.config));
                }
                Ok(None) => {
                    warn!(
                        device_id = %record.id,
                        template_id = %template_id,
                        "referenced template no longer exists, skipping layer"
                    );
                }
                Err(e) => {
                    warn!(
                        device_id = %record.id,
                        template_id = %template_id,
                        error = %e,
                        "template config unreadable, excluding from merge"
                    );
                }
            }
        }

        let overrides = record.decoded_overrides()?;
        if !overrides.is_empty() {
            layers.push(ConfigLayer::new(OVERRIDE_LAYER, overrides));
        }

        self.merger.merge(&layers)
    }
}

/// Negative or out-of-range positions append.
fn insert_at_position(ids: &mut Vec<u32>, id: u32, position: i32) {
    if position < 0 || position as usize >= ids.len() {
        ids.push(id);
    } else {
        ids.insert(position as usize, id);
    }
}
