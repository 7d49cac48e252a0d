//! Drift detection: stored desired configuration vs what the device is
//! actually running. Single-device checks persist the sync status and a
//! trend event; bulk runs fan out with one task and one client per device
//! so a dead device cannot stall or poison the rest.

use std::sync::Arc;
use std::time::Instant;

use domain::client::{DeviceClient, DeviceClientFactory};
use domain::clock::Clock;
use domain::device::SyncStatus;
use domain::error::{ConfigError, Result};
use domain::report::{BulkDriftReport, ConfigDrift, DeviceDriftReport, DriftEvent, DriftStatus};
use domain::repository::{DeviceConfigRepository, ResolutionRepository};
use domain::diff::Severity;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::compare::{Comparator, restrict_to_managed};
use crate::convert::ConverterRegistry;

#[derive(Clone)]
pub struct DriftDetector {
    converters: Arc<ConverterRegistry>,
    comparator: Comparator,
    devices: Arc<dyn DeviceConfigRepository>,
    resolutions: Arc<dyn ResolutionRepository>,
    clock: Arc<dyn Clock>,
}

impl DriftDetector {
    pub fn new(
        converters: Arc<ConverterRegistry>,
        devices: Arc<dyn DeviceConfigRepository>,
        resolutions: Arc<dyn ResolutionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            converters,
            comparator: Comparator::new(),
            devices,
            resolutions,
            clock,
        }
    }

    /// Compare one device's stored desired config against its live view.
    /// Persists the resulting sync status; drift also appends a trend
    /// event.
    pub async fn detect_device(
        &self,
        device_id: &str,
        client: &dyn DeviceClient,
        cancel: &CancellationToken,
    ) -> Result<DeviceDriftReport> {
        let record = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| ConfigError::DeviceNotFound(device_id.to_string()))?;
        let stored = record.decoded_desired_config()?;

        let raw = client
            .get_config(cancel)
            .await
            .map_err(|e| ConfigError::DriftDetectionFailed {
                device_id: device_id.to_string(),
                reason: e.to_string(),
            })?;
        let converter = self.converters.for_generation(client.generation());
        let live = converter.from_wire(&raw, &record.device_type)?;
        let live_view = restrict_to_managed(&live, &stored)?;

        let comparison = self.comparator.compare(&stored, &live_view)?;
        if comparison.matches {
            self.devices
                .set_sync_status(device_id, SyncStatus::InSync)
                .await?;
            return Ok(DeviceDriftReport {
                device_id: device_id.to_string(),
                status: DriftStatus::Synced,
                summary: comparison.summary(),
                drift: None,
                error: None,
            });
        }

        warn!(
            device_id = %device_id,
            differences = comparison.differences.len(),
            "configuration drift detected"
        );
        self.devices
            .set_sync_status(device_id, SyncStatus::Drift)
            .await?;

        let detected_at = self.clock.now();
        self.resolutions
            .append_drift_event(&DriftEvent {
                device_id: device_id.to_string(),
                differences_count: comparison.differences.len(),
                critical_count: comparison.count_by_severity(Severity::Critical),
                detected_at,
            })
            .await?;

        let summary = comparison.summary();
        Ok(DeviceDriftReport {
            device_id: device_id.to_string(),
            status: DriftStatus::Drift,
            summary,
            drift: Some(ConfigDrift {
                device_id: device_id.to_string(),
                differences: comparison,
                detected_at,
                requires_action: true,
            }),
            error: None,
        })
    }

    /// Fan out across a caller-provided device list. Every device gets its
    /// own task and its own client; one device's failure becomes an
    /// error-status row, never an error for the run.
    pub async fn detect_bulk(
        &self,
        device_ids: &[String],
        factory: Arc<dyn DeviceClientFactory>,
        cancel: &CancellationToken,
    ) -> BulkDriftReport {
        let started = Instant::now();
        let mut tasks: JoinSet<(usize, DeviceDriftReport)> = JoinSet::new();

        for (index, device_id) in device_ids.iter().enumerate() {
            let detector = self.clone();
            let factory = factory.clone();
            let device_id = device_id.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let report = detector
                    .check_one(&device_id, factory.as_ref(), &cancel)
                    .await;
                (index, report)
            });
        }

        let mut rows: Vec<(usize, DeviceDriftReport)> = Vec::with_capacity(device_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(row) => rows.push(row),
                Err(e) => warn!(error = %e, "drift task panicked"),
            }
        }
        rows.sort_by_key(|(index, _)| *index);

        let devices: Vec<DeviceDriftReport> = rows.into_iter().map(|(_, row)| row).collect();
        let report = BulkDriftReport {
            total: devices.len(),
            in_sync: devices
                .iter()
                .filter(|r| r.status == DriftStatus::Synced)
                .count(),
            drifted: devices
                .iter()
                .filter(|r| r.status == DriftStatus::Drift)
                .count(),
            errors: devices
                .iter()
                .filter(|r| r.status == DriftStatus::Error)
                .count(),
            devices,
            duration: started.elapsed(),
        };
        info!(
            total = report.total,
            in_sync = report.in_sync,
            drifted = report.drifted,
            errors = report.errors,
            "bulk drift detection finished"
        );
        report
    }

    async fn check_one(
        &self,
        device_id: &str,
        factory: &dyn DeviceClientFactory,
        cancel: &CancellationToken,
    ) -> DeviceDriftReport {
        let outcome = async {
            let client = factory.client_for(device_id).await?;
            self.detect_device(device_id, client.as_ref(), cancel).await
        }
        .await;

        match outcome {
            Ok(report) => report,
            Err(e) => {
                // Best effort; the row already carries the error
                let _ = self
                    .devices
                    .set_sync_status(device_id, SyncStatus::Error)
                    .await;
                DeviceDriftReport {
                    device_id: device_id.to_string(),
                    status: DriftStatus::Error,
                    summary: "drift detection failed".to_string(),
                    drift: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
