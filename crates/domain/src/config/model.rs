use serde::{Deserialize, Serialize};

/// Root aggregate for everything the fleet manages on a device.
///
/// Every section is optional and every leaf inside a section is optional.
/// An absent leaf means "inherit from lower layers / leave the device
/// alone"; `Some(zero)` is an explicit instruction. Serialization must
/// never emit absent leaves, which is what makes layered merge and partial
/// patches possible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coiot: Option<CoIotConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_metering: Option<PowerMeteringConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<DimmingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roller: Option<RollerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led: Option<LedConfig>,
}

impl DeviceConfiguration {
    /// True when no section is present at all.
    pub fn is_empty(&self) -> bool {
        self.wifi.is_none()
            && self.mqtt.is_none()
            && self.auth.is_none()
            && self.system.is_none()
            && self.network.is_none()
            && self.cloud.is_none()
            && self.location.is_none()
            && self.coiot.is_none()
            && self.relay.is_none()
            && self.power_metering.is_none()
            && self.dimming.is_none()
            && self.roller.is_none()
            && self.input.is_none()
            && self.led.is_none()
    }
}

/// WiFi station settings, plus the fallback access point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// "dhcp" or "static"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_point: Option<AccessPointConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// MQTT uplink settings. `server` holds the host only; the gen1 wire joins
/// host and port into a single "host:port" string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_session: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eco_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sntp_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_auto_update: Option<bool>,
}

/// Wired (ethernet) settings for models that have a port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

/// Geographic position and timezone. Field names (`tz`, `lat`, `lng`) are
/// wire-normative and double as merge path segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// CoIoT/CoAP peer reporting (gen1 only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoIotConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<RelayChannel>,
}

/// One relay channel. Channels merge by index; `id` is carried for display
/// and wire addressing, not identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayChannel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// "on", "off", "last" or "switch"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_state: Option<String>,
    /// Seconds until auto-on; 0 disables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_on: Option<f64>,
    /// Seconds until auto-off; 0 disables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_off: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerMeteringConfig {
    /// Overpower protection threshold in watts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimmingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_rate: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading_edge: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxtime_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxtime_close: Option<f64>,
    /// "open", "close" or "stop"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positioning: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputChannel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputChannel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// "momentary", "toggle", "edge" or "detached"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
}

/// Status LED behavior. Gen1 wires these inverted (`led_power_disable`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_indication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_indication: Option<bool>,
}
