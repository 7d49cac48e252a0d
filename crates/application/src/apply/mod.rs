//! Transactional-ish applier: pushes a desired configuration to one
//! device in independent settings groups, captures per-group failures,
//! and decides whether the device still needs a reboot to converge.

pub mod groups;

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::DeviceConfiguration;
use domain::client::DeviceClient;
use domain::config::CloudConfig;
use domain::error::{ConfigError, Result};
use domain::report::{ApplyFailure, ApplyResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compare::Comparator;
use crate::convert::ConverterRegistry;

/// Poll cadence for reboot recovery
const REBOOT_POLL_INITIAL: Duration = Duration::from_millis(500);
const REBOOT_POLL_MAX: Duration = Duration::from_secs(5);

pub struct Applier {
    converters: Arc<ConverterRegistry>,
    comparator: Comparator,
}

impl Applier {
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self {
            converters,
            comparator: Comparator::new(),
        }
    }

    /// Drive the device toward `desired` in one logical operation.
    ///
    /// Group failures are captured in the result, never returned as an
    /// error; an `Err` here means the operation could not start at all
    /// (conversion failure). Cancellation stops before the next group;
    /// the in-flight call completes so the device is not left mid-write.
    pub async fn apply_config(
        &self,
        client: &dyn DeviceClient,
        desired: &DeviceConfiguration,
        device_type: &str,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult> {
        let started = Instant::now();
        let converter = self.converters.for_generation(client.generation());
        let wire = converter.to_wire(desired, device_type)?;
        let groups = groups::split_into_groups(&wire, client.generation());

        let mut result = ApplyResult {
            success: true,
            settings_count: 0,
            applied_count: 0,
            failed_count: 0,
            failures: Vec::new(),
            requires_reboot: false,
            warnings: Vec::new(),
            duration: Duration::ZERO,
        };

        for (group, payload) in &groups {
            if cancel.is_cancelled() {
                result
                    .warnings
                    .push("apply cancelled; remaining settings groups were not attempted".to_string());
                break;
            }
            result.settings_count += 1;
            match client.set_config(group, payload, cancel).await {
                Ok(()) => {
                    debug!(group = %group, "settings group applied");
                    result.applied_count += 1;
                }
                Err(e) => {
                    warn!(group = %group, error = %e, "settings group rejected");
                    result.failed_count += 1;
                    result.failures.push(ApplyFailure {
                        path: group.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        result.success = result.failed_count == 0;

        if !cancel.is_cancelled() {
            self.detect_reboot_requirement(client, desired, device_type, cancel, &mut result)
                .await;
        }

        result.duration = started.elapsed();
        info!(
            applied = result.applied_count,
            failed = result.failed_count,
            requires_reboot = result.requires_reboot,
            "apply finished"
        );
        Ok(result)
    }

    /// Compare the post-apply live view against desired, restricted to the
    /// sections that only take effect after a restart (WiFi station
    /// including static addressing, auth, cloud server, wired network).
    async fn detect_reboot_requirement(
        &self,
        client: &dyn DeviceClient,
        desired: &DeviceConfiguration,
        device_type: &str,
        cancel: &CancellationToken,
        result: &mut ApplyResult,
    ) {
        let desired_sensitive = reboot_sensitive_view(desired);
        if desired_sensitive.is_empty() {
            return;
        }

        let live = match client.get_config(cancel).await {
            Ok(raw) => {
                let converter = self.converters.for_generation(client.generation());
                match converter.from_wire(&raw, device_type) {
                    Ok(config) => config,
                    Err(e) => {
                        result.warnings.push(format!(
                            "could not confirm reboot requirement: {}",
                            e
                        ));
                        return;
                    }
                }
            }
            Err(e) => {
                result
                    .warnings
                    .push(format!("could not confirm reboot requirement: {}", e));
                return;
            }
        };

        let live_sensitive = reboot_sensitive_view(&live);
        match self.comparator.compare(&desired_sensitive, &live_sensitive) {
            Ok(comparison) if !comparison.matches => {
                result.requires_reboot = true;
                result.warnings.push(format!(
                    "device reboot required for {} pending change(s) to take effect",
                    comparison.differences.len()
                ));
            }
            Ok(_) => {}
            Err(e) => result
                .warnings
                .push(format!("could not confirm reboot requirement: {}", e)),
        }
    }

    /// Reboot, then poll the device with backoff until it answers again or
    /// the deadline passes.
    pub async fn reboot_and_wait(
        &self,
        client: &dyn DeviceClient,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        client
            .reboot(cancel)
            .await
            .map_err(|e| ConfigError::RebootFailed(e.to_string()))?;
        info!(address = %client.address(), "reboot issued, waiting for device");

        let deadline = tokio::time::Instant::now() + timeout;
        let mut delay = REBOOT_POLL_INITIAL;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ConfigError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            if client.test_connection(cancel).await.is_ok() {
                info!(address = %client.address(), "device is back after reboot");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ConfigError::DeviceDidNotComeBack {
                    timeout_secs: timeout.as_secs(),
                });
            }
            delay = (delay * 2).min(REBOOT_POLL_MAX);
        }
    }
}

/// Projection of a configuration onto its reboot-sensitive sections. The
/// cloud section matters only for its server endpoint.
fn reboot_sensitive_view(config: &DeviceConfiguration) -> DeviceConfiguration {
    DeviceConfiguration {
        wifi: config.wifi.clone(),
        auth: config.auth.clone(),
        network: config.network.clone(),
        cloud: config.cloud.as_ref().and_then(|c| {
            c.server.as_ref().map(|server| CloudConfig {
                enabled: None,
                server: Some(server.clone()),
            })
        }),
        ..Default::default()
    }
}
