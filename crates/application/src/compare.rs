//! Structural diff between two configurations, with severity and category
//! classification and a human description per divergence.

use domain::DeviceConfiguration;
use domain::diff::{ComparisonResult, DiffCategory, Difference, DifferenceKind, Severity};
use domain::error::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator;

impl Comparator {
    pub fn new() -> Self {
        Self
    }

    /// Diff `expected` (stored/desired) against `actual` (live). `added`
    /// means the device carries something the stored config does not;
    /// `removed` the reverse.
    pub fn compare(
        &self,
        expected: &DeviceConfiguration,
        actual: &DeviceConfiguration,
    ) -> Result<ComparisonResult> {
        let expected_value = serde_json::to_value(expected)?;
        let actual_value = serde_json::to_value(actual)?;

        let mut differences = Vec::new();
        diff_value(&expected_value, &actual_value, "", &mut differences);
        Ok(ComparisonResult::with_differences(differences))
    }
}

fn diff_value(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Difference>) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_child) in exp {
                let child_path = join(path, key);
                match act.get(key) {
                    Some(act_child) => diff_value(exp_child, act_child, &child_path, out),
                    None => emit_side(exp_child, &child_path, DifferenceKind::Removed, out),
                }
            }
            for (key, act_child) in act {
                if !exp.contains_key(key) {
                    emit_side(act_child, &join(path, key), DifferenceKind::Added, out);
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            let shared = exp.len().min(act.len());
            for index in 0..shared {
                diff_value(&exp[index], &act[index], &join(path, &index.to_string()), out);
            }
            // Extra indices on either side are whole-element findings
            for (index, element) in exp.iter().enumerate().skip(shared) {
                out.push(difference(
                    &join(path, &index.to_string()),
                    Some(element.clone()),
                    None,
                    DifferenceKind::Removed,
                ));
            }
            for (index, element) in act.iter().enumerate().skip(shared) {
                out.push(difference(
                    &join(path, &index.to_string()),
                    None,
                    Some(element.clone()),
                    DifferenceKind::Added,
                ));
            }
        }
        (exp, act) => {
            if exp != act {
                out.push(difference(
                    path,
                    Some(exp.clone()),
                    Some(act.clone()),
                    DifferenceKind::Modified,
                ));
            }
        }
    }
}

/// One side is entirely absent; report each leaf under it.
fn emit_side(subtree: &Value, path: &str, kind: DifferenceKind, out: &mut Vec<Difference>) {
    match subtree {
        Value::Object(map) => {
            if map.is_empty() {
                let (expected, actual) = side_values(subtree, kind);
                out.push(difference(path, expected, actual, kind));
            } else {
                for (key, child) in map {
                    emit_side(child, &join(path, key), kind, out);
                }
            }
        }
        Value::Array(items) => {
            for (index, element) in items.iter().enumerate() {
                let (expected, actual) = side_values(element, kind);
                out.push(difference(
                    &join(path, &index.to_string()),
                    expected,
                    actual,
                    kind,
                ));
            }
        }
        leaf => {
            let (expected, actual) = side_values(leaf, kind);
            out.push(difference(path, expected, actual, kind));
        }
    }
}

fn side_values(value: &Value, kind: DifferenceKind) -> (Option<Value>, Option<Value>) {
    match kind {
        DifferenceKind::Removed => (Some(value.clone()), None),
        _ => (None, Some(value.clone())),
    }
}

fn difference(
    path: &str,
    expected: Option<Value>,
    actual: Option<Value>,
    kind: DifferenceKind,
) -> Difference {
    let (category, severity) = classify(path);
    let description = describe(path, &expected, &actual, kind);
    Difference {
        path: path.to_string(),
        expected,
        actual,
        severity,
        category,
        kind,
        description,
    }
}

/// Category comes from the path prefix; severity from the category.
/// Credential leaves are security-critical wherever they live.
pub fn classify(path: &str) -> (DiffCategory, Severity) {
    let first = path.split('.').next().unwrap_or("");
    let leaf = path.rsplit('.').next().unwrap_or("");

    if first == "auth" || leaf == "password" {
        return (DiffCategory::Security, Severity::Critical);
    }
    match first {
        "wifi" | "network" | "mqtt" | "cloud" | "coiot" => {
            (DiffCategory::Network, Severity::Warning)
        }
        "relay" | "input" | "dimming" | "roller" | "power_metering" | "led" => {
            (DiffCategory::Device, Severity::Warning)
        }
        "system" => (DiffCategory::System, Severity::Info),
        "location" => (DiffCategory::Metadata, Severity::Info),
        _ => (DiffCategory::Metadata, Severity::Info),
    }
}

/// Paths safe-mode auto-fix is allowed to touch: metadata plus display
/// names.
pub fn is_metadata_path(path: &str) -> bool {
    let (category, _) = classify(path);
    category == DiffCategory::Metadata
        || path.rsplit('.').next() == Some("name")
        || path == "system.device_name"
}

fn describe(
    path: &str,
    expected: &Option<Value>,
    actual: &Option<Value>,
    kind: DifferenceKind,
) -> String {
    let label = friendly_name(path);
    match kind {
        DifferenceKind::Modified => format!(
            "{} changed from {} to {}",
            label,
            render(expected),
            render(actual)
        ),
        DifferenceKind::Added => format!("{} present on device ({})", label, render(actual)),
        DifferenceKind::Removed => {
            format!("{} missing from device (expected {})", label, render(expected))
        }
    }
}

fn render(value: &Option<Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "unset".to_string(),
    }
}

fn friendly_name(path: &str) -> String {
    match path {
        "mqtt.server" => "MQTT server".to_string(),
        "mqtt.port" => "MQTT port".to_string(),
        "wifi.ssid" => "WiFi SSID".to_string(),
        "wifi.password" => "WiFi password".to_string(),
        "wifi.enabled" => "WiFi".to_string(),
        "auth.enabled" => "authentication".to_string(),
        "auth.password" => "auth password".to_string(),
        "cloud.enabled" => "cloud connection".to_string(),
        "cloud.server" => "cloud server".to_string(),
        "system.device_name" => "device name".to_string(),
        other => other.to_string(),
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

/// Project a live/imported configuration onto the leaves `desired` sets,
/// so comparisons only report what the fleet actually manages and not
/// device-populated defaults.
pub fn restrict_to_managed(
    imported: &DeviceConfiguration,
    desired: &DeviceConfiguration,
) -> Result<DeviceConfiguration> {
    let imported_value = serde_json::to_value(imported)?;
    let desired_value = serde_json::to_value(desired)?;
    let restricted = restrict_value(&imported_value, &desired_value);
    Ok(serde_json::from_value(restricted)?)
}

fn restrict_value(imported: &Value, desired: &Value) -> Value {
    match (imported, desired) {
        (Value::Object(imp), Value::Object(des)) => {
            let mut out = serde_json::Map::new();
            for (key, des_child) in des {
                if let Some(imp_child) = imp.get(key) {
                    out.insert(key.clone(), restrict_value(imp_child, des_child));
                }
            }
            Value::Object(out)
        }
        (Value::Array(imp), Value::Array(des)) => Value::Array(
            imp.iter()
                .zip(des.iter())
                .map(|(i, d)| restrict_value(i, d))
                .collect(),
        ),
        (imp, _) => imp.clone(),
    }
}
