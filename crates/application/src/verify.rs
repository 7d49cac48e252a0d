//! Convergence verification: re-read the device, convert, compare against
//! desired, and compose with the applier for the full
//! apply → reboot → settle → verify path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::DeviceConfiguration;
use domain::client::DeviceClient;
use domain::error::Result;
use domain::report::{ApplyAndVerifyResult, VerifyResult};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::apply::Applier;
use crate::compare::Comparator;
use crate::convert::ConverterRegistry;

/// Upper bound on waiting for a device to return after reboot
const REBOOT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace period between a successful apply and the verification read
const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct Verifier {
    converters: Arc<ConverterRegistry>,
    comparator: Comparator,
    applier: Applier,
}

impl Verifier {
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self {
            applier: Applier::new(converters.clone()),
            comparator: Comparator::new(),
            converters,
        }
    }

    /// GetConfig → from_wire → compare(desired, imported).
    pub async fn verify_config(
        &self,
        client: &dyn DeviceClient,
        desired: &DeviceConfiguration,
        device_type: &str,
        cancel: &CancellationToken,
    ) -> Result<VerifyResult> {
        let started = Instant::now();
        let raw = client.get_config(cancel).await?;
        let converter = self.converters.for_generation(client.generation());
        let imported = converter.from_wire(&raw, device_type)?;

        // Only the leaves the desired config actually sets are verified;
        // device-populated defaults are not divergences.
        let imported_view = crate::compare::restrict_to_managed(&imported, desired)?;
        let differences = self.comparator.compare(desired, &imported_view)?;

        Ok(VerifyResult {
            matches: differences.matches,
            differences,
            imported,
            desired: desired.clone(),
            duration: started.elapsed(),
        })
    }

    /// Apply, reboot if the applier says so (bounded), settle, verify.
    /// `config_applied` is the verify outcome.
    pub async fn apply_and_verify(
        &self,
        client: &dyn DeviceClient,
        desired: &DeviceConfiguration,
        device_type: &str,
        cancel: &CancellationToken,
    ) -> Result<ApplyAndVerifyResult> {
        let started = Instant::now();
        let apply = self
            .applier
            .apply_config(client, desired, device_type, cancel)
            .await?;

        if apply.requires_reboot {
            info!(address = %client.address(), "rebooting device to finish applying settings");
            self.applier
                .reboot_and_wait(client, REBOOT_WAIT_TIMEOUT, cancel)
                .await?;
        }

        tokio::time::sleep(SETTLE_DELAY).await;

        let verify = self
            .verify_config(client, desired, device_type, cancel)
            .await?;
        let config_applied = verify.matches;

        Ok(ApplyAndVerifyResult {
            apply,
            verify: Some(verify),
            config_applied,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::ConfigError;
    use domain::client::{DeviceInfo, Generation};
    use domain::config::{SystemConfig, WifiConfig};
    use domain::config::optional::string_value;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockDevice {
        live: Mutex<Value>,
        apply_updates_live: bool,
        reboots: AtomicUsize,
    }

    impl MockDevice {
        fn new(live: Value) -> Self {
            Self {
                live: Mutex::new(live),
                apply_updates_live: true,
                reboots: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DeviceClient for MockDevice {
        async fn get_info(&self, _c: &CancellationToken) -> Result<DeviceInfo> {
            unimplemented!()
        }

        async fn get_config(&self, _c: &CancellationToken) -> Result<Value> {
            Ok(self.live.lock().unwrap().clone())
        }

        async fn set_config(&self, _g: &str, payload: &Value, _c: &CancellationToken) -> Result<()> {
            if self.apply_updates_live {
                let mut live = self.live.lock().unwrap();
                if let (Some(live_map), Some(patch)) = (live.as_object_mut(), payload.as_object()) {
                    for (k, v) in patch {
                        live_map.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(())
        }

        async fn reboot(&self, _c: &CancellationToken) -> Result<()> {
            self.reboots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn test_connection(&self, _c: &CancellationToken) -> Result<()> {
            Ok(())
        }

        fn generation(&self) -> Generation {
            Generation::Gen1
        }

        fn address(&self) -> &str {
            "192.168.1.70"
        }
    }

    fn verifier() -> Verifier {
        Verifier::new(Arc::new(ConverterRegistry::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_and_verify_converges() {
        let device = MockDevice::new(json!({}));
        let desired = DeviceConfiguration {
            system: Some(SystemConfig {
                device_name: string_value("TestDevice"),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = verifier()
            .apply_and_verify(&device, &desired, "SHSW-1", &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.config_applied);
        let verify = result.verify.unwrap();
        assert!(verify.matches);
        assert!(verify.differences.differences.is_empty());
        assert_eq!(device.reboots.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_and_verify_reboots_when_needed() {
        // set_config does not change the live view, so the reboot probe
        // still sees the old SSID
        let mut device = MockDevice::new(json!({"wifi_sta": {"ssid": "OldNetwork"}}));
        device.apply_updates_live = false;

        let desired = DeviceConfiguration {
            wifi: Some(WifiConfig {
                ssid: string_value("NewNetwork"),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = verifier()
            .apply_and_verify(&device, &desired, "SHSW-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(device.reboots.load(Ordering::SeqCst), 1);
        assert!(result.apply.requires_reboot);
        // Device never actually took the setting, so verify reports it
        assert!(!result.config_applied);
        let verify = result.verify.unwrap();
        assert_eq!(verify.differences.differences[0].path, "wifi.ssid");
    }

    #[tokio::test]
    async fn test_verify_ignores_device_populated_defaults() {
        let device = MockDevice::new(json!({
            "name": "TestDevice",
            "eco_mode_enabled": false,
            "mqtt": {"enable": false, "server": "factory.default:1883"}
        }));
        let desired = DeviceConfiguration {
            system: Some(SystemConfig {
                device_name: string_value("TestDevice"),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = verifier()
            .verify_config(&device, &desired, "SHSW-1", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.matches, "differences: {:?}", result.differences);
    }

    #[tokio::test]
    async fn test_verify_reports_divergence() {
        let device = MockDevice::new(json!({"name": "other-name"}));
        let desired = DeviceConfiguration {
            system: Some(SystemConfig {
                device_name: string_value("TestDevice"),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = verifier()
            .verify_config(&device, &desired, "SHSW-1", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.matches);
        assert_eq!(result.differences.differences[0].path, "system.device_name");
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        struct DeadDevice;
        #[async_trait]
        impl DeviceClient for DeadDevice {
            async fn get_info(&self, _c: &CancellationToken) -> Result<DeviceInfo> {
                unimplemented!()
            }
            async fn get_config(&self, _c: &CancellationToken) -> Result<Value> {
                Err(ConfigError::transport("failed to read settings", "refused"))
            }
            async fn set_config(&self, _g: &str, _p: &Value, _c: &CancellationToken) -> Result<()> {
                unimplemented!()
            }
            async fn reboot(&self, _c: &CancellationToken) -> Result<()> {
                unimplemented!()
            }
            async fn test_connection(&self, _c: &CancellationToken) -> Result<()> {
                unimplemented!()
            }
            fn generation(&self) -> Generation {
                Generation::Gen1
            }
            fn address(&self) -> &str {
                "192.168.1.80"
            }
        }

        let err = verifier()
            .verify_config(
                &DeadDevice,
                &DeviceConfiguration::default(),
                "SHSW-1",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Transport(_)));
    }
}
