use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{DiffCategory, Difference, Severity};
use crate::error::{ConfigError, Result};

/// How a divergence gets resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Push the stored value back to the device
    Restore,
    /// Accept the device value into the stored configuration
    Update,
    /// Mark resolved without touching anything
    Ignore,
    /// Operator-supplied value
    Custom,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Update => "update",
            Self::Ignore => "ignore",
            Self::Custom => "custom",
        }
    }
}

/// Policy gating automatic drift resolution.
///
/// Empty category/severity/device filters match everything; `safe_mode`
/// restricts auto-fix to metadata paths regardless of the other knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
    pub auto_fix_enabled: bool,
    pub safe_mode: bool,
    pub approval_required: bool,
    #[serde(default)]
    pub categories: Vec<DiffCategory>,
    #[serde(default)]
    pub severities: Vec<Severity>,
    /// Device ids this policy covers; empty or `"*"` covers the fleet
    #[serde(default)]
    pub device_filter: Vec<String>,
    #[serde(default)]
    pub auto_fix_categories: Vec<DiffCategory>,
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Drop pending requests older than this (seconds)
    pub max_age_secs: u64,
    /// Wait between retries of a failed fix (seconds)
    pub retry_interval_secs: u64,
    pub max_retries: u32,
    pub default_strategy: ResolutionStrategy,
}

impl ResolutionPolicy {
    /// Whether this policy has anything to say about the given difference
    /// on the given device.
    pub fn applies_to(&self, difference: &Difference, device_id: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&difference.category) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&difference.severity) {
            return false;
        }
        self.matches_device(device_id)
    }

    pub fn matches_device(&self, device_id: &str) -> bool {
        self.device_filter.is_empty()
            || self
                .device_filter
                .iter()
                .any(|d| d == "*" || d == device_id)
    }

    pub fn excludes_path(&self, path: &str) -> bool {
        self.excluded_paths
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{}.", p)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Scheduled,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl RequestPriority {
    /// critical→critical, warning→high, info→medium; Low is reserved for
    /// requests raised without a severity.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Critical,
            Severity::Warning => Self::High,
            Severity::Info => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Drift,
    AutoFixFailed,
}

/// A drift entry waiting on an operator decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub id: String,
    pub device_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_value: Option<Value>,
    pub strategy: ResolutionStrategy,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub request_type: RequestType,
    /// Policy that routed this difference to review, when one matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<u32>,
    pub description: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl ResolutionRequest {
    pub fn approve(&mut self, reviewer: &str, notes: Option<String>) -> Result<()> {
        self.transition(RequestStatus::Pending, RequestStatus::Approved)?;
        self.reviewed_by = Some(reviewer.to_string());
        self.review_notes = notes;
        Ok(())
    }

    pub fn reject(&mut self, reviewer: &str, notes: Option<String>) -> Result<()> {
        self.transition(RequestStatus::Pending, RequestStatus::Rejected)?;
        self.reviewed_by = Some(reviewer.to_string());
        self.review_notes = notes;
        Ok(())
    }

    pub fn schedule(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(RequestStatus::Approved, RequestStatus::Scheduled)?;
        self.scheduled_at = Some(at);
        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = RequestStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn fail(&mut self, at: DateTime<Utc>) {
        self.status = RequestStatus::Failed;
        self.completed_at = Some(at);
        self.attempts += 1;
    }

    /// Failed is terminal but retryable until the policy's retry budget
    /// runs out.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == RequestStatus::Failed && self.attempts <= max_retries
    }

    pub fn is_executable(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Approved | RequestStatus::Scheduled
        )
    }

    fn transition(&mut self, from: RequestStatus, to: RequestStatus) -> Result<()> {
        if self.status != from {
            return Err(ConfigError::InvalidRequestTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Immutable record of one executed resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionHistoryEntry {
    pub id: String,
    pub device_id: String,
    pub path: String,
    pub strategy: ResolutionStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<u32>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DifferenceKind;
    use serde_json::json;

    fn policy() -> ResolutionPolicy {
        ResolutionPolicy {
            id: 1,
            name: "default".to_string(),
            enabled: true,
            auto_fix_enabled: true,
            safe_mode: false,
            approval_required: false,
            categories: vec![],
            severities: vec![],
            device_filter: vec![],
            auto_fix_categories: vec![DiffCategory::Metadata],
            excluded_paths: vec!["auth".to_string()],
            max_age_secs: 86_400,
            retry_interval_secs: 300,
            max_retries: 3,
            default_strategy: ResolutionStrategy::Restore,
        }
    }

    fn difference(category: DiffCategory, severity: Severity) -> Difference {
        Difference {
            path: "mqtt.server".to_string(),
            expected: Some(json!("a")),
            actual: Some(json!("b")),
            severity,
            category,
            kind: DifferenceKind::Modified,
            description: String::new(),
        }
    }

    fn request() -> ResolutionRequest {
        ResolutionRequest {
            id: "req-1".to_string(),
            device_id: "dev-1".to_string(),
            path: "mqtt.server".to_string(),
            current_value: Some(json!("b")),
            expected_value: Some(json!("a")),
            proposed_value: Some(json!("a")),
            strategy: ResolutionStrategy::Restore,
            status: RequestStatus::Pending,
            priority: RequestPriority::High,
            request_type: RequestType::Drift,
            policy_id: Some(1),
            description: String::new(),
            impact: String::new(),
            reviewed_by: None,
            review_notes: None,
            created_at: Utc::now(),
            scheduled_at: None,
            completed_at: None,
            attempts: 0,
        }
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let p = policy();
        assert!(p.applies_to(
            &difference(DiffCategory::Network, Severity::Warning),
            "any-device"
        ));
    }

    #[test]
    fn test_category_filter() {
        let mut p = policy();
        p.categories = vec![DiffCategory::Security];
        assert!(!p.applies_to(
            &difference(DiffCategory::Network, Severity::Warning),
            "dev"
        ));
        assert!(p.applies_to(
            &difference(DiffCategory::Security, Severity::Critical),
            "dev"
        ));
    }

    #[test]
    fn test_device_filter_wildcard() {
        let mut p = policy();
        p.device_filter = vec!["*".to_string()];
        assert!(p.matches_device("whatever"));

        p.device_filter = vec!["dev-1".to_string()];
        assert!(p.matches_device("dev-1"));
        assert!(!p.matches_device("dev-2"));
    }

    #[test]
    fn test_excluded_path_covers_subtree() {
        let p = policy();
        assert!(p.excludes_path("auth"));
        assert!(p.excludes_path("auth.password"));
        assert!(!p.excludes_path("authx.password"));
    }

    #[test]
    fn test_disabled_policy_never_applies() {
        let mut p = policy();
        p.enabled = false;
        assert!(!p.applies_to(
            &difference(DiffCategory::Metadata, Severity::Info),
            "dev"
        ));
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(
            RequestPriority::from_severity(Severity::Critical),
            RequestPriority::Critical
        );
        assert_eq!(
            RequestPriority::from_severity(Severity::Warning),
            RequestPriority::High
        );
        assert_eq!(
            RequestPriority::from_severity(Severity::Info),
            RequestPriority::Medium
        );
    }

    #[test]
    fn test_request_lifecycle() {
        let mut req = request();
        req.approve("alice", Some("looks right".to_string())).unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert!(req.is_executable());

        // Double approval is rejected
        assert!(matches!(
            req.approve("bob", None),
            Err(ConfigError::InvalidRequestTransition { .. })
        ));

        req.complete(Utc::now());
        assert_eq!(req.status, RequestStatus::Completed);
        assert!(req.completed_at.is_some());
    }

    #[test]
    fn test_failed_is_retryable_within_budget() {
        let mut req = request();
        req.fail(Utc::now());
        assert_eq!(req.attempts, 1);
        assert!(req.can_retry(3));

        req.fail(Utc::now());
        req.fail(Utc::now());
        req.fail(Utc::now());
        assert_eq!(req.attempts, 4);
        assert!(!req.can_retry(3));
    }
}
