//! Structural and semantic configuration validation at three strictness
//! levels. Basic catches what a device would reject; strict upgrades weak
//! credentials to errors; production adds operational warnings for
//! internet-facing fleets.

pub mod markers;
pub mod network;
pub mod password;

use std::sync::LazyLock;

use domain::config::{AuthConfig, DeviceConfiguration, WifiConfig};
use domain::validation::{ValidationLevel, ValidationResult};
use regex::Regex;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("hostname pattern")
});

static DEV_NAME_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[-_])(dev|test|tmp|demo|staging)([-_]|$|\d)").expect("dev-name pattern")
});

const RELAY_DEFAULT_STATES: &[&str] = &["on", "off", "last", "switch"];
const INPUT_TYPES: &[&str] = &["momentary", "toggle", "edge", "detached"];
const ROLLER_DEFAULT_STATES: &[&str] = &["open", "close", "stop"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw serialized config. Configs still carrying `{{...}}`
    /// substitution markers get the syntactic safety pass instead of typed
    /// validation.
    pub fn validate_raw(&self, raw: &str, level: ValidationLevel) -> ValidationResult {
        if markers::contains_markers(raw) {
            return markers::validate_markers(raw);
        }
        match serde_json::from_str::<DeviceConfiguration>(raw) {
            Ok(config) => self.validate(&config, level),
            Err(e) => {
                let mut result = ValidationResult::new();
                result.error("INVALID_JSON", "", format!("not a valid configuration: {}", e));
                result
            }
        }
    }

    pub fn validate(
        &self,
        config: &DeviceConfiguration,
        level: ValidationLevel,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(wifi) = &config.wifi {
            self.check_wifi(wifi, level, &mut result);
        }
        if let Some(mqtt) = &config.mqtt {
            self.check_mqtt(mqtt, level, &mut result);
        }
        if let Some(auth) = &config.auth {
            self.check_auth(auth, level, &mut result);
        }
        if let Some(system) = &config.system {
            self.check_system(system, level, &mut result);
        }
        if let Some(net) = &config.network {
            if net.ipv4_method.as_deref() == Some("static") {
                self.check_static_ip(
                    "network",
                    net.ip.as_deref(),
                    net.netmask.as_deref(),
                    net.gateway.as_deref(),
                    level,
                    &mut result,
                );
            }
        }
        if let Some(relay) = &config.relay {
            for (index, channel) in relay.relays.iter().enumerate() {
                let prefix = format!("relay.relays.{}", index);
                if let Some(state) = &channel.default_state {
                    if !RELAY_DEFAULT_STATES.contains(&state.as_str()) {
                        result.error(
                            "INVALID_RELAY_DEFAULT_STATE",
                            &format!("{}.default_state", prefix),
                            format!("'{}' is not one of {:?}", state, RELAY_DEFAULT_STATES),
                        );
                    }
                }
                for (leaf, value) in [("auto_on", channel.auto_on), ("auto_off", channel.auto_off)]
                {
                    if value.is_some_and(|v| v < 0.0) {
                        result.error(
                            "NEGATIVE_TIMER",
                            &format!("{}.{}", prefix, leaf),
                            "timer seconds must not be negative",
                        );
                    }
                }
            }
        }
        if let Some(input) = &config.input {
            for (index, channel) in input.inputs.iter().enumerate() {
                if let Some(kind) = &channel.input_type {
                    if !INPUT_TYPES.contains(&kind.as_str()) {
                        result.error(
                            "INVALID_INPUT_TYPE",
                            &format!("input.inputs.{}.type", index),
                            format!("'{}' is not one of {:?}", kind, INPUT_TYPES),
                        );
                    }
                }
            }
        }
        if let Some(dimming) = &config.dimming {
            let min = dimming.min_brightness.unwrap_or(0);
            let max = dimming.max_brightness.unwrap_or(100);
            if dimming.min_brightness.is_some() && dimming.max_brightness.is_some() && min > max {
                result.error(
                    "INVALID_BRIGHTNESS_RANGE",
                    "dimming.min_brightness",
                    format!("min brightness {} exceeds max {}", min, max),
                );
            }
            for (leaf, value) in [
                ("min_brightness", dimming.min_brightness),
                ("max_brightness", dimming.max_brightness),
            ] {
                if value.is_some_and(|v| v > 100) {
                    result.error(
                        "BRIGHTNESS_OUT_OF_RANGE",
                        &format!("dimming.{}", leaf),
                        "brightness is a percentage (0-100)",
                    );
                }
            }
        }
        if let Some(roller) = &config.roller {
            if let Some(state) = &roller.default_state {
                if !ROLLER_DEFAULT_STATES.contains(&state.as_str()) {
                    result.error(
                        "INVALID_ROLLER_DEFAULT_STATE",
                        "roller.default_state",
                        format!("'{}' is not one of {:?}", state, ROLLER_DEFAULT_STATES),
                    );
                }
            }
            for (leaf, value) in [
                ("maxtime_open", roller.maxtime_open),
                ("maxtime_close", roller.maxtime_close),
            ] {
                if value.is_some_and(|v| v <= 0.0) {
                    result.error(
                        "INVALID_ROLLER_TIME",
                        &format!("roller.{}", leaf),
                        "movement time must be positive",
                    );
                }
            }
        }

        if level >= ValidationLevel::Production {
            self.check_production(config, &mut result);
        }

        result
    }

    fn check_wifi(&self, wifi: &WifiConfig, level: ValidationLevel, result: &mut ValidationResult) {
        if wifi.enabled == Some(true) {
            match wifi.ssid.as_deref().map(str::trim) {
                None | Some("") => {
                    result.error("MISSING_SSID", "wifi.ssid", "SSID is required when WiFi is enabled")
                }
                Some(ssid) if ssid.len() > 32 => {
                    result.error("SSID_TOO_LONG", "wifi.ssid", "SSID exceeds 32 characters")
                }
                _ => {}
            }
        }

        if let Some(pw) = wifi.password.as_deref() {
            if password::is_too_short(pw) {
                let message = "WiFi password is shorter than 8 characters";
                if level >= ValidationLevel::Strict {
                    result.error("WEAK_WIFI_PASSWORD", "wifi.password", message);
                } else {
                    result.warning("WEAK_WIFI_PASSWORD", "wifi.password", message);
                }
            } else if level >= ValidationLevel::Strict && password::is_predictable(pw) {
                result.warning(
                    "PREDICTABLE_PASSWORD",
                    "wifi.password",
                    "password contains repeated or ascending character runs",
                );
            }
        }

        if wifi.ipv4_method.as_deref() == Some("static") {
            self.check_static_ip(
                "wifi",
                wifi.ip.as_deref(),
                wifi.netmask.as_deref(),
                wifi.gateway.as_deref(),
                level,
                result,
            );
        }

        if let Some(ap) = &wifi.access_point {
            if ap.enabled == Some(true) {
                if let Some(pw) = ap.password.as_deref() {
                    if password::is_too_short(pw) {
                        let message = "access point password is shorter than 8 characters";
                        if level >= ValidationLevel::Strict {
                            result.error("WEAK_WIFI_PASSWORD", "wifi.access_point.password", message);
                        } else {
                            result.warning(
                                "WEAK_WIFI_PASSWORD",
                                "wifi.access_point.password",
                                message,
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_static_ip(
        &self,
        section: &str,
        ip: Option<&str>,
        netmask: Option<&str>,
        gateway: Option<&str>,
        level: ValidationLevel,
        result: &mut ValidationResult,
    ) {
        let (Some(ip_raw), Some(mask_raw), Some(gw_raw)) = (ip, netmask, gateway) else {
            result.error(
                "STATIC_IP_INCOMPLETE",
                &format!("{}.ip", section),
                "static addressing needs ip, netmask and gateway",
            );
            return;
        };

        let ip = network::parse_ipv4(ip_raw);
        let mask = network::parse_ipv4(mask_raw);
        let gw = network::parse_ipv4(gw_raw);

        if ip.is_none() {
            result.error(
                "INVALID_IP_ADDRESS",
                &format!("{}.ip", section),
                format!("'{}' is not an IPv4 address", ip_raw),
            );
        }
        if gw.is_none() {
            result.error(
                "INVALID_GATEWAY",
                &format!("{}.gateway", section),
                format!("'{}' is not an IPv4 address", gw_raw),
            );
        }
        match mask {
            None => result.error(
                "INVALID_NETMASK",
                &format!("{}.netmask", section),
                format!("'{}' is not an IPv4 netmask", mask_raw),
            ),
            Some(mask) if !network::is_valid_netmask(mask) => result.error(
                "INVALID_NETMASK",
                &format!("{}.netmask", section),
                format!("'{}' is not a contiguous netmask", mask_raw),
            ),
            _ => {}
        }

        if let (Some(ip), Some(gw), Some(mask)) = (ip, gw, mask) {
            if network::is_valid_netmask(mask) && !network::same_subnet(ip, gw, mask) {
                result.error(
                    "GATEWAY_OUTSIDE_SUBNET",
                    &format!("{}.gateway", section),
                    format!("gateway {} is not in the subnet of {}/{}", gw, ip, mask),
                );
            }
            if level >= ValidationLevel::Production && network::is_public(ip) {
                result.warning(
                    "PUBLIC_IP_RANGE",
                    &format!("{}.ip", section),
                    format!("static address {} is publicly routable", ip),
                );
            }
        }
    }

    fn check_mqtt(
        &self,
        mqtt: &domain::config::MqttConfig,
        level: ValidationLevel,
        result: &mut ValidationResult,
    ) {
        if mqtt.enabled == Some(true)
            && mqtt.server.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            result.error(
                "MISSING_MQTT_SERVER",
                "mqtt.server",
                "server is required when MQTT is enabled",
            );
        }
        if mqtt.qos.is_some_and(|q| q > 2) {
            result.error("INVALID_MQTT_QOS", "mqtt.qos", "QoS must be 0, 1 or 2");
        }
        if level >= ValidationLevel::Production {
            if let Some(server) = mqtt.server.as_deref() {
                if network::is_local_host(server) {
                    result.warning(
                        "MQTT_LOCALHOST_SERVER",
                        "mqtt.server",
                        "MQTT server points at localhost; the device cannot reach it",
                    );
                }
            }
        }
    }

    fn check_auth(&self, auth: &AuthConfig, level: ValidationLevel, result: &mut ValidationResult) {
        if auth.enabled == Some(true) {
            if auth.username.as_deref().map(str::trim).unwrap_or("").is_empty() {
                result.error(
                    "MISSING_AUTH_USERNAME",
                    "auth.username",
                    "username is required when auth is enabled",
                );
            }
            if auth.password.as_deref().unwrap_or("").is_empty() {
                result.error(
                    "MISSING_AUTH_PASSWORD",
                    "auth.password",
                    "password is required when auth is enabled",
                );
            }
        }

        if let Some(pw) = auth.password.as_deref().filter(|p| !p.is_empty()) {
            if password::is_common(pw) {
                let message = "password is on the common-password deny list";
                if level >= ValidationLevel::Strict {
                    result.error("DEFAULT_AUTH_PASSWORD", "auth.password", message);
                } else {
                    result.warning("DEFAULT_AUTH_PASSWORD", "auth.password", message);
                }
            } else if password::is_too_short(pw) {
                let message = "auth password is shorter than 8 characters";
                if level >= ValidationLevel::Strict {
                    result.error("WEAK_AUTH_PASSWORD", "auth.password", message);
                } else {
                    result.warning("WEAK_AUTH_PASSWORD", "auth.password", message);
                }
            } else if level >= ValidationLevel::Strict {
                if password::is_low_complexity(pw) {
                    result.warning(
                        "LOW_PASSWORD_COMPLEXITY",
                        "auth.password",
                        "password uses fewer than 3 of: upper, lower, digit, special",
                    );
                }
                if password::is_predictable(pw) {
                    result.warning(
                        "PREDICTABLE_PASSWORD",
                        "auth.password",
                        "password contains repeated or ascending character runs",
                    );
                }
            }
        }
    }

    fn check_system(
        &self,
        system: &domain::config::SystemConfig,
        level: ValidationLevel,
        result: &mut ValidationResult,
    ) {
        if let Some(name) = system.device_name.as_deref() {
            if !HOSTNAME.is_match(name) {
                result.error(
                    "INVALID_HOSTNAME",
                    "system.device_name",
                    format!("'{}' is not a valid hostname", name),
                );
            } else if level >= ValidationLevel::Production && DEV_NAME_HINT.is_match(name) {
                result.warning(
                    "DEVELOPMENT_DEVICE_NAME",
                    "system.device_name",
                    format!("'{}' looks like a development name", name),
                );
            }
        }
    }

    fn check_production(&self, config: &DeviceConfiguration, result: &mut ValidationResult) {
        let cloud_enabled = config
            .cloud
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(false);
        if cloud_enabled {
            result.warning(
                "CLOUD_ENABLED",
                "cloud.enabled",
                "device phones home to the vendor cloud",
            );
        }

        let mqtt_external = config.mqtt.as_ref().is_some_and(|m| {
            m.enabled == Some(true)
                && m.server
                    .as_deref()
                    .is_some_and(|s| !network::is_local_host(s))
        });
        let auth_enabled = config
            .auth
            .as_ref()
            .and_then(|a| a.enabled)
            .unwrap_or(false);
        if (cloud_enabled || mqtt_external) && !auth_enabled {
            result.warning(
                "AUTH_DISABLED_EXTERNAL_ACCESS",
                "auth.enabled",
                "device has external connectivity but no authentication",
            );
        }

        if config
            .system
            .as_ref()
            .and_then(|s| s.firmware_auto_update)
            == Some(false)
        {
            result.warning(
                "FIRMWARE_AUTO_UPDATE_DISABLED",
                "system.firmware_auto_update",
                "device will not pick up security fixes on its own",
            );
        }
    }
}
