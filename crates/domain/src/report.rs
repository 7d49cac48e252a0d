use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeviceConfiguration;
use crate::diff::ComparisonResult;

/// One settings group that the device rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of pushing one desired configuration to one device.
///
/// Per-group failures are captured here, never returned as an error; the
/// caller inspects `failures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub success: bool,
    pub settings_count: usize,
    pub applied_count: usize,
    pub failed_count: usize,
    pub failures: Vec<ApplyFailure>,
    pub requires_reboot: bool,
    pub warnings: Vec<String>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ApplyResult {
    pub fn report(&self) -> String {
        let mut out = format!(
            "applied {}/{} settings groups in {:?}",
            self.applied_count, self.settings_count, self.duration
        );
        for failure in &self.failures {
            out.push_str(&format!("\n- {} failed: {}", failure.path, failure.error));
        }
        for warning in &self.warnings {
            out.push_str(&format!("\n- warning: {}", warning));
        }
        out
    }
}

/// Outcome of re-reading a device and comparing against desired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    #[serde(rename = "match")]
    pub matches: bool,
    pub differences: ComparisonResult,
    pub imported: DeviceConfiguration,
    pub desired: DeviceConfiguration,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl VerifyResult {
    pub fn report(&self) -> String {
        if self.matches {
            format!("device converged in {:?}", self.duration)
        } else {
            format!(
                "device did not converge ({:?})\n{}",
                self.duration,
                self.differences.report()
            )
        }
    }
}

/// Composition of apply + optional reboot + verify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyAndVerifyResult {
    pub apply: ApplyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifyResult>,
    pub config_applied: bool,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ApplyAndVerifyResult {
    pub fn report(&self) -> String {
        let mut out = self.apply.report();
        if let Some(verify) = &self.verify {
            out.push('\n');
            out.push_str(&verify.report());
        }
        out
    }
}

/// Sync state of one device after a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Synced,
    Drift,
    Error,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Drift => "drift",
            Self::Error => "error",
        }
    }
}

/// Detected divergence between stored and live configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDrift {
    pub device_id: String,
    pub differences: ComparisonResult,
    pub detected_at: DateTime<Utc>,
    pub requires_action: bool,
}

/// Per-device row in a drift run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDriftReport {
    pub device_id: String,
    pub status: DriftStatus,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<ConfigDrift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a bulk drift run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDriftReport {
    pub total: usize,
    pub in_sync: usize,
    pub drifted: usize,
    pub errors: usize,
    pub devices: Vec<DeviceDriftReport>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl BulkDriftReport {
    pub fn summary(&self) -> String {
        format!(
            "{} devices checked: {} in sync, {} drifted, {} errors",
            self.total, self.in_sync, self.drifted, self.errors
        )
    }
}

/// Append-only trend record written whenever drift is detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub device_id: String,
    pub differences_count: usize,
    pub critical_count: usize,
    pub detected_at: DateTime<Utc>,
}

/// Serialize `Duration` as integer milliseconds so reports stay readable
/// in JSON.
pub mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_result_report_lists_failures() {
        let result = ApplyResult {
            success: false,
            settings_count: 3,
            applied_count: 2,
            failed_count: 1,
            failures: vec![ApplyFailure {
                path: "mqtt".to_string(),
                error: "device rejected settings".to_string(),
            }],
            requires_reboot: false,
            warnings: vec![],
            duration: Duration::from_millis(120),
        };
        let report = result.report();
        assert!(report.contains("2/3"));
        assert!(report.contains("mqtt failed: device rejected settings"));
    }

    #[test]
    fn test_duration_serializes_as_millis() {
        let report = BulkDriftReport {
            total: 0,
            in_sync: 0,
            drifted: 0,
            errors: 0,
            devices: vec![],
            duration: Duration::from_millis(1500),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["duration"], serde_json::json!(1500));

        let back: BulkDriftReport = serde_json::from_value(value).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }
}
