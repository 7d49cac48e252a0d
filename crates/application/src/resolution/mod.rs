//! Policy-driven drift resolution: auto-fix what policy allows, raise a
//! review request for everything else, and keep an append-only history of
//! every executed fix.

pub mod cache;

pub use cache::{DEFAULT_POLICY_TTL, PolicyCache};

use std::sync::Arc;
use std::time::Instant;

use domain::DeviceConfiguration;
use domain::client::{DeviceClient, DeviceClientFactory};
use domain::clock::Clock;
use domain::device::encode_config;
use domain::diff::{DiffCategory, Difference};
use domain::error::{ConfigError, Result};
use domain::report::ConfigDrift;
use domain::repository::{DeviceConfigRepository, ResolutionRepository};
use domain::resolution::{
    RequestPriority, RequestStatus, RequestType, ResolutionHistoryEntry, ResolutionPolicy,
    ResolutionRequest, ResolutionStrategy,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::apply::Applier;
use crate::compare::is_metadata_path;
use crate::convert::ConverterRegistry;
use crate::paths;

/// What happened to one drift difference
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    AutoFixed {
        path: String,
        strategy: ResolutionStrategy,
    },
    RequestCreated {
        request_id: String,
        path: String,
    },
    Skipped {
        path: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Decision {
    AutoFix(ResolutionStrategy),
    Manual,
}

pub struct ResolutionEngine {
    repo: Arc<dyn ResolutionRepository>,
    devices: Arc<dyn DeviceConfigRepository>,
    factory: Arc<dyn DeviceClientFactory>,
    applier: Applier,
    clock: Arc<dyn Clock>,
    policies: PolicyCache,
}

impl ResolutionEngine {
    pub fn new(
        repo: Arc<dyn ResolutionRepository>,
        devices: Arc<dyn DeviceConfigRepository>,
        factory: Arc<dyn DeviceClientFactory>,
        converters: Arc<ConverterRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            devices,
            factory,
            applier: Applier::new(converters),
            clock,
            policies: PolicyCache::default(),
        }
    }

    pub fn with_policy_cache(mut self, cache: PolicyCache) -> Self {
        self.policies = cache;
        self
    }

    /// Route every difference of a detected drift through the policy
    /// decision table. Auto-fix failures degrade to review requests; a
    /// difference no policy covers is skipped.
    pub async fn process_drift(
        &self,
        drift: &ConfigDrift,
        device_type: &str,
        client: &dyn DeviceClient,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolutionOutcome>> {
        let policies = self.policies.get(self.repo.as_ref()).await?;
        let mut outcomes = Vec::with_capacity(drift.differences.differences.len());

        for difference in &drift.differences.differences {
            let Some(policy) = policies
                .iter()
                .find(|p| p.applies_to(difference, &drift.device_id))
            else {
                outcomes.push(ResolutionOutcome::Skipped {
                    path: difference.path.clone(),
                    reason: "no applicable policy".to_string(),
                });
                continue;
            };

            match decide(policy, difference) {
                Decision::AutoFix(strategy) => {
                    match self
                        .execute_auto_fix(
                            &drift.device_id,
                            device_type,
                            difference,
                            strategy,
                            policy,
                            client,
                            cancel,
                        )
                        .await
                    {
                        Ok(()) => outcomes.push(ResolutionOutcome::AutoFixed {
                            path: difference.path.clone(),
                            strategy,
                        }),
                        Err(e) => {
                            warn!(
                                device_id = %drift.device_id,
                                path = %difference.path,
                                error = %e,
                                "auto-fix failed, escalating to review"
                            );
                            let request = self
                                .create_manual_request(
                                    &drift.device_id,
                                    difference,
                                    Some(policy),
                                    RequestType::AutoFixFailed,
                                )
                                .await?;
                            outcomes.push(ResolutionOutcome::RequestCreated {
                                request_id: request.id,
                                path: difference.path.clone(),
                            });
                        }
                    }
                }
                Decision::Manual => {
                    let request = self
                        .create_manual_request(
                            &drift.device_id,
                            difference,
                            Some(policy),
                            RequestType::Drift,
                        )
                        .await?;
                    outcomes.push(ResolutionOutcome::RequestCreated {
                        request_id: request.id,
                        path: difference.path.clone(),
                    });
                }
            }
        }

        Ok(outcomes)
    }

    async fn execute_auto_fix(
        &self,
        device_id: &str,
        device_type: &str,
        difference: &Difference,
        strategy: ResolutionStrategy,
        policy: &ResolutionPolicy,
        client: &dyn DeviceClient,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started_at = self.clock.now();
        let started = Instant::now();

        let outcome = self
            .run_strategy(
                device_id,
                device_type,
                &difference.path,
                strategy,
                difference.expected.clone(),
                difference.actual.clone(),
                client,
                cancel,
            )
            .await;

        let entry = ResolutionHistoryEntry {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            path: difference.path.clone(),
            strategy,
            old_value: difference.actual.clone(),
            new_value: match strategy {
                ResolutionStrategy::Update => difference.actual.clone(),
                _ => difference.expected.clone(),
            },
            policy_id: Some(policy.id),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.repo.append_history(&entry).await?;

        if outcome.is_ok() {
            info!(
                device_id = %device_id,
                path = %difference.path,
                strategy = %strategy.as_str(),
                "drift auto-fixed"
            );
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_strategy(
        &self,
        device_id: &str,
        device_type: &str,
        path: &str,
        strategy: ResolutionStrategy,
        expected: Option<Value>,
        actual: Option<Value>,
        client: &dyn DeviceClient,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match strategy {
            ResolutionStrategy::Restore => {
                let value = expected.ok_or_else(|| ConfigError::AutoFixSkipped {
                    reason: format!("no stored value to restore at {}", path),
                })?;
                self.push_value(path, value, device_type, client, cancel).await
            }
            ResolutionStrategy::Custom => {
                let value = expected.ok_or_else(|| ConfigError::AutoFixSkipped {
                    reason: format!("no proposed value for {}", path),
                })?;
                self.push_value(path, value, device_type, client, cancel).await
            }
            ResolutionStrategy::Update => self.accept_device_value(device_id, path, actual).await,
            ResolutionStrategy::Ignore => Ok(()),
        }
    }

    /// Push a single leaf back to the device as a minimal patch config.
    async fn push_value(
        &self,
        path: &str,
        value: Value,
        device_type: &str,
        client: &dyn DeviceClient,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let patch = patch_config_for(path, value)?;
        let result = self
            .applier
            .apply_config(client, &patch, device_type, cancel)
            .await?;
        if let Some(failure) = result.failures.first() {
            return Err(ConfigError::transport(
                "failed to restore setting",
                &failure.error,
            ));
        }
        if result.applied_count == 0 {
            return Err(ConfigError::AutoFixSkipped {
                reason: format!("path {} produced no wire settings for {}", path, device_type),
            });
        }
        Ok(())
    }

    /// Accept the live value into the stored configuration: it lands in
    /// the device overrides (the operator-owned layer) and is mirrored
    /// into the materialized desired config so the drift clears.
    async fn accept_device_value(
        &self,
        device_id: &str,
        path: &str,
        value: Option<Value>,
    ) -> Result<()> {
        let record = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| ConfigError::DeviceNotFound(device_id.to_string()))?;

        let overrides = edit_config(&record.decoded_overrides()?, path, value.clone())?;
        self.devices
            .update_overrides(device_id, &encode_config(&overrides)?)
            .await?;

        let desired = edit_config(&record.decoded_desired_config()?, path, value)?;
        self.devices
            .update_desired_config(device_id, &encode_config(&desired)?)
            .await?;
        Ok(())
    }

    async fn create_manual_request(
        &self,
        device_id: &str,
        difference: &Difference,
        policy: Option<&ResolutionPolicy>,
        request_type: RequestType,
    ) -> Result<ResolutionRequest> {
        let strategy = policy
            .map(|p| auto_fix_strategy(p, difference))
            .unwrap_or(ResolutionStrategy::Restore);
        let request = ResolutionRequest {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            path: difference.path.clone(),
            current_value: difference.actual.clone(),
            expected_value: difference.expected.clone(),
            proposed_value: match strategy {
                ResolutionStrategy::Update => difference.actual.clone(),
                _ => difference.expected.clone(),
            },
            strategy,
            status: RequestStatus::Pending,
            priority: RequestPriority::from_severity(difference.severity),
            request_type,
            policy_id: policy.map(|p| p.id),
            description: difference.description.clone(),
            impact: impact_text(difference),
            reviewed_by: None,
            review_notes: None,
            created_at: self.clock.now(),
            scheduled_at: None,
            completed_at: None,
            attempts: 0,
        };
        self.repo.save_request(&request).await?;
        info!(
            device_id = %device_id,
            path = %difference.path,
            priority = %request.priority.as_str(),
            "resolution request created"
        );
        Ok(request)
    }

    /// Persist a policy after checking it does not collide with an
    /// existing one, then drop the cache so the next decision sees it.
    pub async fn save_policy(&self, policy: &ResolutionPolicy) -> Result<()> {
        let existing = self.repo.list_policies().await?;
        if existing
            .iter()
            .any(|p| p.name == policy.name && p.id != policy.id)
        {
            return Err(ConfigError::PolicyConflict(format!(
                "policy name '{}' is already taken",
                policy.name
            )));
        }
        self.repo.save_policy(policy).await?;
        self.policies.invalidate().await;
        Ok(())
    }

    /// Approve a pending request. Executes immediately unless a schedule
    /// time is supplied, in which case the request parks as scheduled.
    pub async fn approve_request(
        &self,
        request_id: &str,
        reviewer: &str,
        notes: Option<String>,
        schedule_at: Option<chrono::DateTime<chrono::Utc>>,
        cancel: &CancellationToken,
    ) -> Result<ResolutionRequest> {
        let mut request = self.load_request(request_id).await?;
        request.approve(reviewer, notes)?;

        if let Some(at) = schedule_at {
            request.schedule(at)?;
            self.repo.save_request(&request).await?;
            return Ok(request);
        }

        self.execute(&mut request, cancel).await?;
        Ok(request)
    }

    pub async fn reject_request(
        &self,
        request_id: &str,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<ResolutionRequest> {
        let mut request = self.load_request(request_id).await?;
        request.reject(reviewer, notes)?;
        self.repo.save_request(&request).await?;
        Ok(request)
    }

    /// Run an approved or scheduled request now.
    pub async fn execute_request(
        &self,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionRequest> {
        let mut request = self.load_request(request_id).await?;
        if !request.is_executable() {
            return Err(ConfigError::InvalidRequestTransition {
                from: request.status.as_str().to_string(),
                to: RequestStatus::Completed.as_str().to_string(),
            });
        }
        self.execute(&mut request, cancel).await?;
        Ok(request)
    }

    /// Re-run a failed request while its policy's retry budget lasts.
    pub async fn retry_request(
        &self,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionRequest> {
        let mut request = self.load_request(request_id).await?;
        let max_retries = match request.policy_id {
            Some(policy_id) => self
                .policies
                .get(self.repo.as_ref())
                .await?
                .iter()
                .find(|p| p.id == policy_id)
                .map(|p| p.max_retries)
                .unwrap_or(3),
            None => 3,
        };
        if !request.can_retry(max_retries) {
            return Err(ConfigError::AutoFixSkipped {
                reason: format!(
                    "request {} is not retryable ({} attempts, budget {})",
                    request_id, request.attempts, max_retries
                ),
            });
        }
        self.execute(&mut request, cancel).await?;
        Ok(request)
    }

    async fn execute(
        &self,
        request: &mut ResolutionRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let record = self
            .devices
            .find_by_id(&request.device_id)
            .await?
            .ok_or_else(|| ConfigError::DeviceNotFound(request.device_id.clone()))?;
        let started_at = self.clock.now();
        let started = Instant::now();

        let outcome = match request.strategy {
            ResolutionStrategy::Update => {
                self.accept_device_value(
                    &request.device_id,
                    &request.path,
                    request.current_value.clone(),
                )
                .await
            }
            ResolutionStrategy::Ignore => Ok(()),
            ResolutionStrategy::Restore | ResolutionStrategy::Custom => {
                match request.proposed_value.clone().or(request.expected_value.clone()) {
                    Some(value) => {
                        let client = self.factory.client_for(&request.device_id).await?;
                        self.push_value(
                            &request.path,
                            value,
                            &record.device_type,
                            client.as_ref(),
                            cancel,
                        )
                        .await
                    }
                    None => Err(ConfigError::AutoFixSkipped {
                        reason: format!("no value to apply for {}", request.path),
                    }),
                }
            }
        };

        let now = self.clock.now();
        match &outcome {
            Ok(()) => request.complete(now),
            Err(_) => request.fail(now),
        }

        let entry = ResolutionHistoryEntry {
            id: Uuid::new_v4().to_string(),
            device_id: request.device_id.clone(),
            path: request.path.clone(),
            strategy: request.strategy,
            old_value: request.current_value.clone(),
            new_value: request.proposed_value.clone(),
            policy_id: request.policy_id,
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.repo.append_history(&entry).await?;
        self.repo.save_request(request).await?;
        outcome
    }

    async fn load_request(&self, request_id: &str) -> Result<ResolutionRequest> {
        self.repo
            .find_request(request_id)
            .await?
            .ok_or_else(|| ConfigError::RequestNotFound(request_id.to_string()))
    }
}

/// The policy decision table for one difference.
fn decide(policy: &ResolutionPolicy, difference: &Difference) -> Decision {
    if !policy.auto_fix_enabled {
        return Decision::Manual;
    }
    if policy.safe_mode && !is_metadata_path(&difference.path) {
        return Decision::Manual;
    }
    if policy.excludes_path(&difference.path) {
        return Decision::Manual;
    }
    if policy.auto_fix_categories.contains(&difference.category) {
        let strategy = auto_fix_strategy(policy, difference);
        if strategy == ResolutionStrategy::Custom {
            // Custom needs an operator-supplied value
            return Decision::Manual;
        }
        return Decision::AutoFix(strategy);
    }
    Decision::Manual
}

/// Security always restores the stored value; metadata always accepts the
/// device's; everything else follows the policy default.
fn auto_fix_strategy(policy: &ResolutionPolicy, difference: &Difference) -> ResolutionStrategy {
    if difference.category == DiffCategory::Security {
        ResolutionStrategy::Restore
    } else if is_metadata_path(&difference.path) {
        ResolutionStrategy::Update
    } else {
        policy.default_strategy
    }
}

fn impact_text(difference: &Difference) -> String {
    match difference.category {
        DiffCategory::Security => "device security posture diverges from policy".to_string(),
        DiffCategory::Network => "device connectivity may differ from plan".to_string(),
        DiffCategory::Device => "device behavior differs from desired configuration".to_string(),
        DiffCategory::System => "system settings differ from desired configuration".to_string(),
        DiffCategory::Metadata => "cosmetic metadata differs".to_string(),
    }
}

/// Build the minimal typed config that sets exactly one dotted path.
fn patch_config_for(path: &str, value: Value) -> Result<DeviceConfiguration> {
    let mut root = Value::Object(serde_json::Map::new());
    paths::set_path(&mut root, path, value)?;
    Ok(serde_json::from_value(root)?)
}

fn edit_config(
    config: &DeviceConfiguration,
    path: &str,
    value: Option<Value>,
) -> Result<DeviceConfiguration> {
    let mut projected = serde_json::to_value(config)?;
    match value {
        Some(v) => paths::set_path(&mut projected, path, v)?,
        // Accepting an absent device value means dropping the leaf
        None => {
            if paths::remove_path(&mut projected, path).is_err() {
                return Ok(config.clone());
            }
        }
    }
    Ok(serde_json::from_value(projected)?)
}
