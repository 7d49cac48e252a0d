use thiserror::Error;

use crate::validation::ValidationResult;

/// Domain-level errors for the configuration core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Template not found: {0}")]
    TemplateNotFound(u32),

    #[error("Template {id} is in use by {device_count} device(s)")]
    TemplateInUse { id: u32, device_count: usize },

    #[error("Template IDs not found: {0:?}")]
    TemplateIdsNotFound(Vec<u32>),

    #[error("Invalid template scope: {0}")]
    InvalidScope(String),

    #[error("Device type is required for device_type-scoped templates")]
    DeviceTypeRequired,

    #[error("Template name already exists: {0}")]
    TemplateNameTaken(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Conversion failed for section {section}: {reason}")]
    Conversion { section: String, reason: String },

    #[error("Unsupported device generation: {0}")]
    UnsupportedGeneration(String),

    #[error("Validation failed with {} error(s)", .0.errors.len())]
    ValidationFailed(ValidationResult),

    #[error("No such path: {0}")]
    NoSuchPath(String),

    #[error("Reboot failed: {0}")]
    RebootFailed(String),

    #[error("Device did not come back after reboot within {timeout_secs}s")]
    DeviceDidNotComeBack { timeout_secs: u64 },

    #[error("Drift detection failed for {device_id}: {reason}")]
    DriftDetectionFailed { device_id: String, reason: String },

    #[error("Auto-fix skipped: {reason}")]
    AutoFixSkipped { reason: String },

    #[error("Conflicting resolution policies: {0}")]
    PolicyConflict(String),

    #[error("Resolution request not found: {0}")]
    RequestNotFound(String),

    #[error("Invalid request transition from {from} to {to}")]
    InvalidRequestTransition { from: String, to: String },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ConfigError {
    /// Wrap a repository/store failure with a semantic verb.
    pub fn repository(context: &str, cause: impl std::fmt::Display) -> Self {
        Self::Repository(format!("{}: {}", context, cause))
    }

    /// Wrap a device transport failure with a semantic verb.
    pub fn transport(context: &str, cause: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{}: {}", context, cause))
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
