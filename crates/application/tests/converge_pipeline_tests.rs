//! Use-case tests for the full converge pipeline:
//! merge -> validate -> apply -> (reboot) -> verify against a scripted
//! in-memory gen1 device.

use application::convert::ConverterRegistry;
use application::merge::{ConfigLayer, Merger, field_source};
use application::validate::Validator;
use application::verify::Verifier;
use async_trait::async_trait;
use domain::DeviceConfiguration;
use domain::client::{DeviceClient, DeviceInfo, Generation};
use domain::config::optional::{bool_value, float_value, int_value, string_value};
use domain::config::{LocationConfig, MqttConfig, SystemConfig, WifiConfig};
use domain::error::{ConfigError, Result};
use domain::validation::ValidationLevel;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

// --- Infrastructure mocks (ports) ---

/// Gen1 device simulation: settings groups land in a flat document the
/// way `/settings` would report them, except for reboot-gated sections.
struct FakeGen1Device {
    settings: Mutex<Value>,
    /// wifi writes park here until a reboot
    pending_wifi: Mutex<Option<Value>>,
    reboot_gates_wifi: bool,
}

impl FakeGen1Device {
    fn new(initial: Value, reboot_gates_wifi: bool) -> Self {
        Self {
            settings: Mutex::new(initial),
            pending_wifi: Mutex::new(None),
            reboot_gates_wifi,
        }
    }
}

#[async_trait]
impl DeviceClient for FakeGen1Device {
    async fn get_info(&self, _cancel: &CancellationToken) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            id: "AABBCC".to_string(),
            generation: Generation::Gen1,
            model: "SHPLG-S".to_string(),
            firmware: "v1.14.0".to_string(),
            mac: "AABBCC".to_string(),
            auth_enabled: false,
        })
    }

    async fn get_config(&self, _cancel: &CancellationToken) -> Result<Value> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn set_config(&self, group: &str, payload: &Value, _cancel: &CancellationToken) -> Result<()> {
        if group == "wifi" && self.reboot_gates_wifi {
            *self.pending_wifi.lock().unwrap() = Some(payload.clone());
            return Ok(());
        }
        let mut settings = self.settings.lock().unwrap();
        if let (Some(doc), Some(patch)) = (settings.as_object_mut(), payload.as_object()) {
            for (key, value) in patch {
                doc.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn reboot(&self, _cancel: &CancellationToken) -> Result<()> {
        if let Some(pending) = self.pending_wifi.lock().unwrap().take() {
            let mut settings = self.settings.lock().unwrap();
            if let (Some(doc), Some(patch)) = (settings.as_object_mut(), pending.as_object()) {
                for (key, value) in patch {
                    doc.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn test_connection(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn generation(&self) -> Generation {
        Generation::Gen1
    }

    fn address(&self) -> &str {
        "192.168.1.42"
    }
}

fn fleet_layers() -> Vec<ConfigLayer> {
    vec![
        ConfigLayer::new(
            "global",
            DeviceConfiguration {
                mqtt: Some(MqttConfig {
                    enabled: bool_value(true),
                    server: string_value("global.broker"),
                    port: int_value(1883u16),
                    ..Default::default()
                }),
                location: Some(LocationConfig {
                    tz: string_value("UTC"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ),
        ConfigLayer::new(
            "group",
            DeviceConfiguration {
                mqtt: Some(MqttConfig {
                    port: int_value(8883u16),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ),
        ConfigLayer::new(
            "device-override",
            DeviceConfiguration {
                location: Some(LocationConfig {
                    lat: float_value(40.7128),
                    ..Default::default()
                }),
                system: Some(SystemConfig {
                    device_name: string_value("kitchen-plug"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ),
    ]
}

#[tokio::test(start_paused = true)]
async fn merged_desired_config_converges_on_device() {
    // ----------------------------------------------------
    // GIVEN: a three-layer desired config that validates clean
    // ----------------------------------------------------
    let merged = Merger::new().merge(&fleet_layers()).unwrap();
    assert_eq!(field_source(&merged.sources, "mqtt.port").unwrap(), "group");
    assert_eq!(
        field_source(&merged.sources, "location.lat").unwrap(),
        "device-override"
    );

    let validation = Validator::new().validate(&merged.config, ValidationLevel::Strict);
    assert!(validation.valid, "unexpected errors: {:?}", validation.errors);

    // ----------------------------------------------------
    // WHEN: it is applied and verified against a fresh device
    // ----------------------------------------------------
    let device = FakeGen1Device::new(json!({}), false);
    let verifier = Verifier::new(Arc::new(ConverterRegistry::new()));
    let result = verifier
        .apply_and_verify(&device, &merged.config, "SHPLG-S", &CancellationToken::new())
        .await
        .unwrap();

    // ----------------------------------------------------
    // THEN: the device converged and the result says so
    // ----------------------------------------------------
    assert!(result.apply.success);
    assert!(!result.apply.requires_reboot);
    assert!(result.config_applied);
    let verify = result.verify.unwrap();
    assert!(verify.matches);

    let imported_mqtt = verify.imported.mqtt.unwrap();
    assert_eq!(imported_mqtt.server.as_deref(), Some("global.broker"));
    assert_eq!(imported_mqtt.port, Some(8883));
}

#[tokio::test(start_paused = true)]
async fn wifi_change_rides_through_reboot() {
    // GIVEN: a device that holds wifi writes until reboot
    let device = FakeGen1Device::new(
        json!({"wifi_sta": {"enabled": true, "ssid": "OldNetwork"}}),
        true,
    );
    let desired = DeviceConfiguration {
        wifi: Some(WifiConfig {
            enabled: bool_value(true),
            ssid: string_value("NewNetwork"),
            ..Default::default()
        }),
        ..Default::default()
    };

    // WHEN: apply-and-verify runs
    let verifier = Verifier::new(Arc::new(ConverterRegistry::new()));
    let result = verifier
        .apply_and_verify(&device, &desired, "SHPLG-S", &CancellationToken::new())
        .await
        .unwrap();

    // THEN: the applier saw the stale SSID, requested the reboot, and the
    // post-reboot verify converged
    assert!(result.apply.requires_reboot);
    assert!(result.apply.warnings.iter().any(|w| w.contains("reboot")));
    assert!(result.config_applied);
    assert_eq!(
        result.verify.unwrap().imported.wifi.unwrap().ssid.as_deref(),
        Some("NewNetwork")
    );
}

#[tokio::test]
async fn verify_alone_reports_divergence_without_touching_device() {
    let device = FakeGen1Device::new(json!({"name": "factory-name"}), false);
    let desired = DeviceConfiguration {
        system: Some(SystemConfig {
            device_name: string_value("kitchen-plug"),
            ..Default::default()
        }),
        ..Default::default()
    };

    let verifier = Verifier::new(Arc::new(ConverterRegistry::new()));
    let result = verifier
        .verify_config(&device, &desired, "SHPLG-S", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.matches);
    assert_eq!(result.differences.differences.len(), 1);
    assert_eq!(result.differences.differences[0].path, "system.device_name");
    // Nothing was written
    assert_eq!(
        device.settings.lock().unwrap().clone(),
        json!({"name": "factory-name"})
    );
}

#[tokio::test]
async fn cancellation_stops_between_groups() {
    struct CancellingDevice {
        cancel: CancellationToken,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeviceClient for CancellingDevice {
        async fn get_info(&self, _c: &CancellationToken) -> Result<DeviceInfo> {
            unimplemented!()
        }
        async fn get_config(&self, _c: &CancellationToken) -> Result<Value> {
            Ok(json!({}))
        }
        async fn set_config(&self, group: &str, _p: &Value, _c: &CancellationToken) -> Result<()> {
            self.calls.lock().unwrap().push(group.to_string());
            // Cancellation arrives while the first group is in flight; the
            // call itself completes
            self.cancel.cancel();
            Ok(())
        }
        async fn reboot(&self, _c: &CancellationToken) -> Result<()> {
            Ok(())
        }
        async fn test_connection(&self, _c: &CancellationToken) -> Result<()> {
            Ok(())
        }
        fn generation(&self) -> Generation {
            Generation::Gen1
        }
        fn address(&self) -> &str {
            "192.168.1.43"
        }
    }

    let cancel = CancellationToken::new();
    let device = CancellingDevice {
        cancel: cancel.clone(),
        calls: Mutex::new(Vec::new()),
    };

    let desired = DeviceConfiguration {
        mqtt: Some(MqttConfig {
            server: string_value("broker"),
            ..Default::default()
        }),
        cloud: Some(domain::config::CloudConfig {
            enabled: bool_value(false),
            ..Default::default()
        }),
        ..Default::default()
    };

    let applier = application::apply::Applier::new(Arc::new(ConverterRegistry::new()));
    let result = applier
        .apply_config(&device, &desired, "SHPLG-S", &cancel)
        .await
        .unwrap();

    // Only the first group was attempted, and it completed
    assert_eq!(device.calls.lock().unwrap().clone(), vec!["mqtt"]);
    assert_eq!(result.settings_count, 1);
    assert_eq!(result.applied_count, 1);
    assert!(result.warnings.iter().any(|w| w.contains("cancelled")));
}

#[tokio::test]
async fn malformed_wire_fails_with_section_name() {
    let device = FakeGen1Device::new(json!({"mqtt": {"server": 42}}), false);
    let verifier = Verifier::new(Arc::new(ConverterRegistry::new()));
    let err = verifier
        .verify_config(
            &device,
            &DeviceConfiguration::default(),
            "SHPLG-S",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    match err {
        ConfigError::Conversion { section, .. } => assert_eq!(section, "mqtt"),
        other => panic!("unexpected error: {:?}", other),
    }
}
