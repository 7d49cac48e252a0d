//! Deterministic layered merge with per-leaf provenance.
//!
//! Layers are applied in caller order; the last layer to set a leaf wins
//! and is recorded in the source map. The walk happens over the JSON
//! projection of the typed model: serialization omits absent leaves, so
//! key presence in the projection is exactly leaf presence.

use std::collections::BTreeMap;

use domain::config::DeviceConfiguration;
use domain::error::{ConfigError, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// One named contribution to a merge (`global`, a template name,
/// `device-override`).
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub name: String,
    pub config: DeviceConfiguration,
}

impl ConfigLayer {
    pub fn new(name: impl Into<String>, config: DeviceConfiguration) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// Merged configuration plus the layer that last set each leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub config: DeviceConfiguration,
    /// Dotted leaf path -> layer name
    pub sources: BTreeMap<String, String>,
}

/// Look up which layer set a leaf.
pub fn field_source<'a>(sources: &'a BTreeMap<String, String>, path: &str) -> Result<&'a str> {
    sources
        .get(path)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::NoSuchPath(path.to_string()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Merger;

impl Merger {
    pub fn new() -> Self {
        Self
    }

    /// Merge ordered layers into one configuration. Empty layers
    /// contribute nothing and are skipped.
    pub fn merge(&self, layers: &[ConfigLayer]) -> Result<MergeResult> {
        let mut acc = Value::Object(Map::new());
        let mut sources = BTreeMap::new();

        for layer in layers {
            if layer.config.is_empty() {
                debug!(layer = %layer.name, "skipping empty merge layer");
                continue;
            }
            let projected = serde_json::to_value(&layer.config)?;
            merge_value(&mut acc, &projected, &layer.name, "", &mut sources);
        }

        let config = serde_json::from_value(acc)?;
        Ok(MergeResult { config, sources })
    }

    /// Two-layer convenience used for override patching; provenance is
    /// discarded.
    pub fn merge_pair(
        &self,
        base: &DeviceConfiguration,
        patch: &DeviceConfiguration,
    ) -> Result<DeviceConfiguration> {
        let result = self.merge(&[
            ConfigLayer::new("base", base.clone()),
            ConfigLayer::new("patch", patch.clone()),
        ])?;
        Ok(result.config)
    }
}

fn merge_value(
    acc: &mut Value,
    layer: &Value,
    layer_name: &str,
    prefix: &str,
    sources: &mut BTreeMap<String, String>,
) {
    match layer {
        Value::Object(entries) => {
            if !acc.is_object() {
                *acc = Value::Object(Map::new());
            }
            let acc_map = acc.as_object_mut().expect("accumulator is an object");
            for (key, child) in entries {
                let child_path = join_path(prefix, key);
                let slot = acc_map.entry(key.clone()).or_insert(Value::Null);
                merge_value(slot, child, layer_name, &child_path, sources);
            }
        }
        Value::Array(items) => {
            // Index is identity: the result grows to the longest layer and
            // missing indices are never collapsed.
            if !acc.is_array() {
                *acc = Value::Array(Vec::new());
            }
            let acc_items = acc.as_array_mut().expect("accumulator is an array");
            while acc_items.len() < items.len() {
                acc_items.push(Value::Object(Map::new()));
            }
            for (index, child) in items.iter().enumerate() {
                let child_path = join_path(prefix, &index.to_string());
                merge_value(&mut acc_items[index], child, layer_name, &child_path, sources);
            }
        }
        Value::Null => {
            // The typed model never serializes absent leaves; a literal
            // null is treated as absent and contributes nothing.
        }
        scalar => {
            *acc = scalar.clone();
            sources.insert(prefix.to_string(), layer_name.to_string());
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::config::{
        LocationConfig, MqttConfig, RelayChannel, RelayConfig, SystemConfig, WifiConfig,
    };
    use domain::config::optional::{float_value, int_value, string_value};

    fn mqtt_layer(name: &str, server: Option<&str>, port: Option<u16>) -> ConfigLayer {
        ConfigLayer::new(
            name,
            DeviceConfiguration {
                mqtt: Some(MqttConfig {
                    server: server.map(str::to_string),
                    port,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_three_layer_merge_with_provenance() {
        let global = ConfigLayer::new(
            "global",
            DeviceConfiguration {
                mqtt: Some(MqttConfig {
                    server: string_value("global.broker"),
                    port: int_value(1883),
                    ..Default::default()
                }),
                location: Some(LocationConfig {
                    tz: string_value("UTC"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let group = mqtt_layer("group", None, Some(8883));
        let device = ConfigLayer::new(
            "device",
            DeviceConfiguration {
                location: Some(LocationConfig {
                    lat: float_value(40.7128),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let result = Merger::new().merge(&[global, group, device]).unwrap();

        let mqtt = result.config.mqtt.unwrap();
        assert_eq!(mqtt.server.as_deref(), Some("global.broker"));
        assert_eq!(mqtt.port, Some(8883));
        let location = result.config.location.unwrap();
        assert_eq!(location.tz.as_deref(), Some("UTC"));
        assert_eq!(location.lat, Some(40.7128));

        assert_eq!(field_source(&result.sources, "mqtt.server").unwrap(), "global");
        assert_eq!(field_source(&result.sources, "mqtt.port").unwrap(), "group");
        assert_eq!(field_source(&result.sources, "location.tz").unwrap(), "global");
        assert_eq!(field_source(&result.sources, "location.lat").unwrap(), "device");
    }

    #[test]
    fn test_slice_merge_by_index() {
        let global = ConfigLayer::new(
            "global",
            DeviceConfiguration {
                relay: Some(RelayConfig {
                    relays: vec![
                        RelayChannel {
                            id: Some(0),
                            auto_off: float_value(3600.0),
                            ..Default::default()
                        },
                        RelayChannel {
                            id: Some(1),
                            auto_off: float_value(7200.0),
                            ..Default::default()
                        },
                    ],
                }),
                ..Default::default()
            },
        );
        let device = ConfigLayer::new(
            "device",
            DeviceConfiguration {
                relay: Some(RelayConfig {
                    relays: vec![RelayChannel {
                        id: Some(0),
                        name: string_value("Kitchen"),
                        ..Default::default()
                    }],
                }),
                ..Default::default()
            },
        );

        let result = Merger::new().merge(&[global, device]).unwrap();

        let relays = result.config.relay.unwrap().relays;
        assert_eq!(relays.len(), 2);
        assert_eq!(relays[0].name.as_deref(), Some("Kitchen"));
        assert_eq!(relays[0].auto_off, Some(3600.0));
        assert_eq!(relays[1].auto_off, Some(7200.0));

        assert_eq!(
            field_source(&result.sources, "relay.relays.0.name").unwrap(),
            "device"
        );
        assert_eq!(
            field_source(&result.sources, "relay.relays.0.auto_off").unwrap(),
            "global"
        );
    }

    #[test]
    fn test_absent_section_stays_absent() {
        let result = Merger::new()
            .merge(&[
                mqtt_layer("a", Some("x"), None),
                mqtt_layer("b", None, Some(1883)),
            ])
            .unwrap();
        assert!(result.config.wifi.is_none());
        assert!(result.config.system.is_none());
    }

    #[test]
    fn test_empty_layers_are_skipped() {
        let empty = ConfigLayer::new("empty", DeviceConfiguration::default());
        let result = Merger::new()
            .merge(&[empty, mqtt_layer("real", Some("broker"), None)])
            .unwrap();
        assert_eq!(
            result.config.mqtt.unwrap().server.as_deref(),
            Some("broker")
        );
        assert!(!result.sources.values().any(|v| v == "empty"));
    }

    #[test]
    fn test_zero_value_overrides() {
        // Some(false)/Some(0) in a later layer must override earlier values
        let loud = ConfigLayer::new(
            "loud",
            DeviceConfiguration {
                system: Some(SystemConfig {
                    eco_mode: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let quiet = ConfigLayer::new(
            "quiet",
            DeviceConfiguration {
                system: Some(SystemConfig {
                    eco_mode: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let result = Merger::new().merge(&[loud, quiet]).unwrap();
        assert_eq!(result.config.system.unwrap().eco_mode, Some(false));
        assert_eq!(
            field_source(&result.sources, "system.eco_mode").unwrap(),
            "quiet"
        );
    }

    #[test]
    fn test_every_leaf_has_exactly_one_source() {
        let layers = vec![
            mqtt_layer("one", Some("a"), Some(1)),
            mqtt_layer("two", Some("b"), None),
        ];
        let result = Merger::new().merge(&layers).unwrap();

        let projected = serde_json::to_value(&result.config).unwrap();
        let mut leaf_paths = Vec::new();
        collect_leaves(&projected, "", &mut leaf_paths);
        for path in &leaf_paths {
            assert!(
                result.sources.contains_key(path),
                "leaf {} missing from source map",
                path
            );
        }
        assert_eq!(leaf_paths.len(), result.sources.len());
    }

    fn collect_leaves(value: &Value, prefix: &str, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    collect_leaves(v, &join_path(prefix, k), out);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    collect_leaves(v, &join_path(prefix, &i.to_string()), out);
                }
            }
            _ => out.push(prefix.to_string()),
        }
    }

    #[test]
    fn test_wifi_unset_leaves_survive_later_layers() {
        let first = ConfigLayer::new(
            "first",
            DeviceConfiguration {
                wifi: Some(WifiConfig {
                    ssid: string_value("Lab"),
                    password: string_value("hunter2hunter2"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let second = ConfigLayer::new(
            "second",
            DeviceConfiguration {
                wifi: Some(WifiConfig {
                    ssid: string_value("Prod"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let result = Merger::new().merge(&[first, second]).unwrap();
        let wifi = result.config.wifi.unwrap();
        assert_eq!(wifi.ssid.as_deref(), Some("Prod"));
        assert_eq!(wifi.password.as_deref(), Some("hunter2hunter2"));
    }
}
