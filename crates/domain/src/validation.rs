use serde::{Deserialize, Serialize};

/// Strictness levels for configuration validation. Levels are cumulative:
/// strict runs everything basic does, production everything strict does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// Syntactic checks plus required-when-enabled
    Basic,
    /// Adds length/complexity thresholds; upgrades weak credentials to errors
    Strict,
    /// Adds operational warnings for internet-facing fleets
    Production,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Strict => "strict",
            Self::Production => "production",
        }
    }
}

impl Default for ValidationLevel {
    fn default() -> Self {
        Self::Basic
    }
}

/// How bad a single validation finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// One validation finding, addressable by code and dotted path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Triple-severity validation outcome. Errors flip `valid` to false;
/// warnings and info never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
        }
    }

    pub fn error(&mut self, code: &str, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(code, path, message));
        self.valid = false;
    }

    pub fn warning(&mut self, code: &str, path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(code, path, message));
    }

    pub fn note(&mut self, code: &str, path: &str, message: impl Into<String>) {
        self.info.push(ValidationIssue::new(code, path, message));
    }

    /// Merge another result into this one.
    pub fn absorb(&mut self, other: ValidationResult) {
        self.valid = self.valid && other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
            .any(|i| i.code == code)
    }

    pub fn error_codes(&self) -> Vec<&str> {
        self.errors.iter().map(|i| i.code.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_invalidate() {
        let mut result = ValidationResult::new();
        assert!(result.valid);

        result.warning("WEAK_WIFI_PASSWORD", "wifi.password", "too short");
        assert!(result.valid);

        result.error("INVALID_HOSTNAME", "system.device_name", "bad chars");
        assert!(!result.valid);
        assert_eq!(result.error_codes(), vec!["INVALID_HOSTNAME"]);
    }

    #[test]
    fn test_absorb_carries_invalidity() {
        let mut outer = ValidationResult::new();
        let mut inner = ValidationResult::new();
        inner.error("MISSING_SSID", "wifi.ssid", "required when enabled");

        outer.absorb(inner);
        assert!(!outer.valid);
        assert!(outer.has_code("MISSING_SSID"));
    }
}
