//! Dotted-path access over JSON projections of the typed model.
//!
//! Paths use JSON field names with numeric segments for array indices,
//! e.g. `relay.relays.0.name`. The accessors are fully recursive; a path
//! addresses any depth, not just top-level keys.

use domain::error::{ConfigError, Result};
use serde_json::{Map, Value};

/// Read the value at `path`, if present.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, allocating intermediate objects and padding
/// arrays with empty objects as needed.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::NoSuchPath(path.to_string()));
    }
    set_segments(root, &segments, value, path)
}

fn set_segments(node: &mut Value, segments: &[&str], value: Value, full_path: &str) -> Result<()> {
    let segment = segments[0];
    let rest = &segments[1..];

    if let Ok(index) = segment.parse::<usize>() {
        if node.is_null() {
            *node = Value::Array(Vec::new());
        }
        let Value::Array(items) = node else {
            return Err(ConfigError::NoSuchPath(full_path.to_string()));
        };
        while items.len() <= index {
            items.push(Value::Object(Map::new()));
        }
        if rest.is_empty() {
            items[index] = value;
            return Ok(());
        }
        return set_segments(&mut items[index], rest, value, full_path);
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return Err(ConfigError::NoSuchPath(full_path.to_string()));
    };
    if rest.is_empty() {
        map.insert(segment.to_string(), value);
        return Ok(());
    }
    let child = map.entry(segment.to_string()).or_insert(Value::Null);
    set_segments(child, rest, value, full_path)
}

/// Remove the leaf at `path`. Missing paths are an error so callers can
/// distinguish "cleared" from "never set".
pub fn remove_path(root: &mut Value, path: &str) -> Result<()> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, path),
    };

    let parent = match parent_path {
        Some(p) => match get_path_mut(root, p) {
            Some(v) => v,
            None => return Err(ConfigError::NoSuchPath(path.to_string())),
        },
        None => root,
    };

    match parent {
        Value::Object(map) => map
            .remove(leaf)
            .map(|_| ())
            .ok_or_else(|| ConfigError::NoSuchPath(path.to_string())),
        _ => Err(ConfigError::NoSuchPath(path.to_string())),
    }
}

fn get_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_and_indexed() {
        let root = json!({
            "mqtt": {"server": "broker.lan"},
            "relay": {"relays": [{"name": "Kitchen"}, {"auto_off": 7200}]}
        });

        assert_eq!(get_path(&root, "mqtt.server"), Some(&json!("broker.lan")));
        assert_eq!(
            get_path(&root, "relay.relays.1.auto_off"),
            Some(&json!(7200))
        );
        assert_eq!(get_path(&root, "relay.relays.2.auto_off"), None);
        assert_eq!(get_path(&root, "wifi.ssid"), None);
    }

    #[test]
    fn test_set_allocates_intermediates() {
        let mut root = json!({});
        set_path(&mut root, "relay.relays.1.name", json!("Hall")).unwrap();
        assert_eq!(
            root,
            json!({"relay": {"relays": [{}, {"name": "Hall"}]}})
        );
    }

    #[test]
    fn test_set_overwrites_leaf() {
        let mut root = json!({"mqtt": {"server": "old"}});
        set_path(&mut root, "mqtt.server", json!("new")).unwrap();
        assert_eq!(root, json!({"mqtt": {"server": "new"}}));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut root = json!({"mqtt": {"server": "broker"}});
        let err = set_path(&mut root, "mqtt.server.port", json!(1883)).unwrap_err();
        assert!(matches!(err, ConfigError::NoSuchPath(_)));
    }

    #[test]
    fn test_remove_leaf() {
        let mut root = json!({"auth": {"enabled": true, "username": "admin"}});
        remove_path(&mut root, "auth.username").unwrap();
        assert_eq!(root, json!({"auth": {"enabled": true}}));

        assert!(remove_path(&mut root, "auth.username").is_err());
    }
}
