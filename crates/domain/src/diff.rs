use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How much a single divergence matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Functional area a divergence belongs to, derived from the path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    Security,
    Network,
    Device,
    System,
    Metadata,
}

impl DiffCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Network => "network",
            Self::Device => "device",
            Self::System => "system",
            Self::Metadata => "metadata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "security" => Some(Self::Security),
            "network" => Some(Self::Network),
            "device" => Some(Self::Device),
            "system" => Some(Self::System),
            "metadata" => Some(Self::Metadata),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    Added,
    Removed,
    Modified,
}

impl DifferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

/// One leaf-level divergence between two configurations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    pub severity: Severity,
    pub category: DiffCategory,
    pub kind: DifferenceKind,
    pub description: String,
}

/// Ordered structural diff between two configurations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "match")]
    pub matches: bool,
    pub differences: Vec<Difference>,
}

impl ComparisonResult {
    pub fn matching() -> Self {
        Self {
            matches: true,
            differences: Vec::new(),
        }
    }

    pub fn with_differences(differences: Vec<Difference>) -> Self {
        Self {
            matches: differences.is_empty(),
            differences,
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.differences
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Human summary line used by drift reports.
    pub fn summary(&self) -> String {
        if self.matches {
            "configuration matches".to_string()
        } else {
            format!(
                "{} configuration differences detected",
                self.differences.len()
            )
        }
    }

    /// Bulleted human report, worst findings first.
    pub fn report(&self) -> String {
        if self.matches {
            return self.summary();
        }
        let mut ordered: Vec<&Difference> = self.differences.iter().collect();
        ordered.sort_by_key(|d| d.severity);

        let mut out = self.summary();
        for diff in ordered {
            out.push_str(&format!(
                "\n- [{}] {}: {}",
                diff.severity.as_str(),
                diff.path,
                diff.description
            ));
        }
        out
    }
}

impl Default for ComparisonResult {
    fn default() -> Self {
        Self::matching()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_diff(path: &str, severity: Severity) -> Difference {
        Difference {
            path: path.to_string(),
            expected: Some(json!("a")),
            actual: Some(json!("b")),
            severity,
            category: DiffCategory::Network,
            kind: DifferenceKind::Modified,
            description: format!("{} changed from \"a\" to \"b\"", path),
        }
    }

    #[test]
    fn test_summary_counts_differences() {
        let result = ComparisonResult::with_differences(vec![
            sample_diff("mqtt.server", Severity::Warning),
            sample_diff("wifi.ssid", Severity::Warning),
        ]);
        assert!(!result.matches);
        assert_eq!(result.summary(), "2 configuration differences detected");
    }

    #[test]
    fn test_report_orders_by_severity() {
        let result = ComparisonResult::with_differences(vec![
            sample_diff("location.tz", Severity::Info),
            sample_diff("auth.enabled", Severity::Critical),
        ]);
        let report = result.report();
        let critical_pos = report.find("auth.enabled").unwrap();
        let info_pos = report.find("location.tz").unwrap();
        assert!(critical_pos < info_pos);
    }

    #[test]
    fn test_match_field_serialized_name() {
        let value = serde_json::to_value(ComparisonResult::matching()).unwrap();
        assert_eq!(value["match"], json!(true));
    }
}
