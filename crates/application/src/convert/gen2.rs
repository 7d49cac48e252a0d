//! Converter for the generation-2/3 RPC configuration dialect.
//!
//! The gen2 blob is keyed by component: `sys`, `wifi` (with nested
//! `sta`/`ap`), `mqtt`, `cloud`, `eth`, `auth`, and per-channel blocks
//! `switch:N` / `input:N` / `cover:N` / `light:N`. Timers are a bool +
//! delay pair on the wire and plain seconds in the typed model; the power
//! limit lives on `switch:0`. Gen2 has no CoIoT and no LED block, so this
//! converter does not represent those sections.

use domain::DeviceConfiguration;
use domain::client::Generation;
use domain::config::{
    AccessPointConfig, AuthConfig, CloudConfig, DimmingConfig, InputChannel, InputConfig,
    LocationConfig, MqttConfig, NetworkConfig, PowerMeteringConfig, RelayChannel, RelayConfig,
    RollerConfig, SystemConfig, WifiConfig,
};
use domain::error::Result;
use serde_json::{Map, Value};

use super::capabilities::{self, GEN2_DEVICE_TYPES};
use super::{
    as_object, conversion_error, get_bool, get_f64, get_string, get_u8, section, set_opt,
    insert_object, join_host_port, split_host_port,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Gen2Converter;

impl super::ConfigConverter for Gen2Converter {
    fn generation(&self) -> Generation {
        Generation::Gen2
    }

    fn supported_device_types(&self) -> &'static [&'static str] {
        GEN2_DEVICE_TYPES
    }

    fn from_wire(&self, raw: &Value, _device_type: &str) -> Result<DeviceConfiguration> {
        let root = as_object(raw)?;

        let (system, location) = extract_sys(root).map_err(|r| conversion_error("sys", r))?;
        let (relay, power_metering) =
            extract_switches(root).map_err(|r| conversion_error("switch", r))?;

        Ok(DeviceConfiguration {
            wifi: extract_wifi(root).map_err(|r| conversion_error("wifi", r))?,
            mqtt: extract_mqtt(root).map_err(|r| conversion_error("mqtt", r))?,
            auth: extract_auth(root).map_err(|r| conversion_error("auth", r))?,
            system,
            network: extract_eth(root).map_err(|r| conversion_error("eth", r))?,
            cloud: extract_cloud(root).map_err(|r| conversion_error("cloud", r))?,
            location,
            coiot: None,
            relay,
            power_metering,
            dimming: extract_light(root).map_err(|r| conversion_error("light:0", r))?,
            roller: extract_cover(root).map_err(|r| conversion_error("cover:0", r))?,
            input: extract_inputs(root).map_err(|r| conversion_error("input", r))?,
            led: None,
        })
    }

    fn to_wire(&self, config: &DeviceConfiguration, device_type: &str) -> Result<Value> {
        let caps = capabilities::for_device_type(device_type);
        let mut root = Map::new();

        let mut sys = Map::new();
        if let Some(system) = &config.system {
            let mut device = Map::new();
            set_opt(&mut device, "name", system.device_name.clone());
            set_opt(&mut device, "eco_mode", system.eco_mode);
            set_opt(&mut device, "discoverable", system.discoverable);
            insert_object(&mut sys, "device", device);

            let mut sntp = Map::new();
            set_opt(&mut sntp, "server", system.sntp_server.clone());
            insert_object(&mut sys, "sntp", sntp);
        }
        if let Some(location) = &config.location {
            let mut wire = Map::new();
            set_opt(&mut wire, "tz", location.tz.clone());
            set_opt(&mut wire, "lat", location.lat);
            set_opt(&mut wire, "lon", location.lng);
            insert_object(&mut sys, "location", wire);
        }
        insert_object(&mut root, "sys", sys);

        if let Some(wifi) = &config.wifi {
            let mut wire_wifi = Map::new();
            let mut sta = Map::new();
            set_opt(&mut sta, "enable", wifi.enabled);
            set_opt(&mut sta, "ssid", wifi.ssid.clone());
            set_opt(&mut sta, "pass", wifi.password.clone());
            set_opt(&mut sta, "ipv4mode", wifi.ipv4_method.clone());
            set_opt(&mut sta, "ip", wifi.ip.clone());
            set_opt(&mut sta, "netmask", wifi.netmask.clone());
            set_opt(&mut sta, "gw", wifi.gateway.clone());
            set_opt(&mut sta, "nameserver", wifi.dns.clone());
            insert_object(&mut wire_wifi, "sta", sta);

            if let Some(ap) = &wifi.access_point {
                let mut wire_ap = Map::new();
                set_opt(&mut wire_ap, "enable", ap.enabled);
                set_opt(&mut wire_ap, "ssid", ap.ssid.clone());
                set_opt(&mut wire_ap, "pass", ap.password.clone());
                insert_object(&mut wire_wifi, "ap", wire_ap);
            }
            insert_object(&mut root, "wifi", wire_wifi);
        }

        if let Some(mqtt) = &config.mqtt {
            let mut wire = Map::new();
            set_opt(&mut wire, "enable", mqtt.enabled);
            if let Some(server) = &mqtt.server {
                wire.insert(
                    "server".to_string(),
                    Value::from(join_host_port(server, mqtt.port)),
                );
            }
            set_opt(&mut wire, "user", mqtt.username.clone());
            set_opt(&mut wire, "pass", mqtt.password.clone());
            set_opt(&mut wire, "client_id", mqtt.client_id.clone());
            insert_object(&mut root, "mqtt", wire);
        }

        if let Some(auth) = &config.auth {
            let mut wire = Map::new();
            set_opt(&mut wire, "enable", auth.enabled);
            set_opt(&mut wire, "user", auth.username.clone());
            set_opt(&mut wire, "pass", auth.password.clone());
            insert_object(&mut root, "auth", wire);
        }

        if let Some(cloud) = &config.cloud {
            let mut wire = Map::new();
            set_opt(&mut wire, "enable", cloud.enabled);
            set_opt(&mut wire, "server", cloud.server.clone());
            insert_object(&mut root, "cloud", wire);
        }

        if caps.ethernet {
            if let Some(net) = &config.network {
                let mut wire = Map::new();
                set_opt(&mut wire, "enable", net.enabled);
                set_opt(&mut wire, "ipv4mode", net.ipv4_method.clone());
                set_opt(&mut wire, "ip", net.ip.clone());
                set_opt(&mut wire, "netmask", net.netmask.clone());
                set_opt(&mut wire, "gw", net.gateway.clone());
                set_opt(&mut wire, "nameserver", net.dns.clone());
                insert_object(&mut root, "eth", wire);
            }
        }

        if caps.relay_count > 0 {
            if let Some(relay) = &config.relay {
                for (index, channel) in relay
                    .relays
                    .iter()
                    .take(caps.relay_count as usize)
                    .enumerate()
                {
                    let mut wire = Map::new();
                    set_opt(&mut wire, "name", channel.name.clone());
                    set_opt(&mut wire, "initial_state", channel.default_state.clone());
                    write_timer(&mut wire, "auto_on", channel.auto_on);
                    write_timer(&mut wire, "auto_off", channel.auto_off);
                    if index == 0 && caps.power_metering {
                        if let Some(power) = &config.power_metering {
                            set_opt(&mut wire, "power_limit", power.max_power);
                        }
                    }
                    insert_object(&mut root, &format!("switch:{}", index), wire);
                }
            } else if caps.power_metering {
                if let Some(power) = &config.power_metering {
                    let mut wire = Map::new();
                    set_opt(&mut wire, "power_limit", power.max_power);
                    insert_object(&mut root, "switch:0", wire);
                }
            }
        }

        if caps.input_count > 0 {
            if let Some(input) = &config.input {
                for (index, channel) in input
                    .inputs
                    .iter()
                    .take(caps.input_count as usize)
                    .enumerate()
                {
                    let mut wire = Map::new();
                    set_opt(&mut wire, "name", channel.name.clone());
                    set_opt(&mut wire, "type", channel.input_type.clone());
                    set_opt(&mut wire, "invert", channel.invert);
                    insert_object(&mut root, &format!("input:{}", index), wire);
                }
            }
        }

        if caps.roller {
            if let Some(roller) = &config.roller {
                let mut wire = Map::new();
                set_opt(&mut wire, "maxtime_open", roller.maxtime_open);
                set_opt(&mut wire, "maxtime_close", roller.maxtime_close);
                set_opt(&mut wire, "initial_state", roller.default_state.clone());
                set_opt(&mut wire, "invert_directions", roller.swap);
                insert_object(&mut root, "cover:0", wire);
            }
        }

        if caps.dimming {
            if let Some(dimming) = &config.dimming {
                let mut wire = Map::new();
                set_opt(&mut wire, "min_brightness", dimming.min_brightness);
                set_opt(&mut wire, "max_brightness", dimming.max_brightness);
                set_opt(&mut wire, "fade_rate", dimming.fade_rate);
                set_opt(&mut wire, "leading_edge", dimming.leading_edge);
                insert_object(&mut root, "light:0", wire);
            }
        }

        Ok(Value::Object(root))
    }
}

/// Typed timers are seconds; the wire wants an enable flag plus a delay.
/// `Some(0)` is "explicitly off", which must survive the round trip.
fn write_timer(wire: &mut Map<String, Value>, key: &str, seconds: Option<f64>) {
    match seconds {
        Some(secs) if secs > 0.0 => {
            wire.insert(key.to_string(), Value::from(true));
            wire.insert(format!("{}_delay", key), Value::from(secs));
        }
        Some(_) => {
            wire.insert(key.to_string(), Value::from(false));
        }
        None => {}
    }
}

fn read_timer(
    wire: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<f64>, String> {
    match get_bool(wire, key)? {
        Some(true) => Ok(Some(get_f64(wire, &format!("{}_delay", key))?.unwrap_or(0.0))),
        Some(false) => Ok(Some(0.0)),
        None => Ok(None),
    }
}

type Extracted<T> = std::result::Result<Option<T>, String>;

fn extract_sys(
    root: &Map<String, Value>,
) -> std::result::Result<(Option<SystemConfig>, Option<LocationConfig>), String> {
    let Some(sys) = section(root, "sys")? else {
        return Ok((None, None));
    };

    let system = match section(sys, "device")? {
        Some(device) => {
            let system = SystemConfig {
                device_name: get_string(device, "name")?,
                eco_mode: get_bool(device, "eco_mode")?,
                discoverable: get_bool(device, "discoverable")?,
                sntp_server: match section(sys, "sntp")? {
                    Some(sntp) => get_string(sntp, "server")?,
                    None => None,
                },
                firmware_auto_update: None,
            };
            (system != SystemConfig::default()).then_some(system)
        }
        None => match section(sys, "sntp")? {
            Some(sntp) => get_string(sntp, "server")?.map(|server| SystemConfig {
                sntp_server: Some(server),
                ..Default::default()
            }),
            None => None,
        },
    };

    let location = match section(sys, "location")? {
        Some(wire) => {
            let location = LocationConfig {
                tz: get_string(wire, "tz")?,
                lat: get_f64(wire, "lat")?,
                lng: get_f64(wire, "lon")?,
            };
            (location != LocationConfig::default()).then_some(location)
        }
        None => None,
    };

    Ok((system, location))
}

fn extract_wifi(root: &Map<String, Value>) -> Extracted<WifiConfig> {
    let Some(wire) = section(root, "wifi")? else {
        return Ok(None);
    };

    let mut wifi = WifiConfig::default();
    if let Some(sta) = section(wire, "sta")? {
        wifi.enabled = get_bool(sta, "enable")?;
        wifi.ssid = get_string(sta, "ssid")?;
        wifi.password = get_string(sta, "pass")?;
        wifi.ipv4_method = get_string(sta, "ipv4mode")?;
        wifi.ip = get_string(sta, "ip")?;
        wifi.netmask = get_string(sta, "netmask")?;
        wifi.gateway = get_string(sta, "gw")?;
        wifi.dns = get_string(sta, "nameserver")?;
    }
    if let Some(ap) = section(wire, "ap")? {
        wifi.access_point = Some(AccessPointConfig {
            enabled: get_bool(ap, "enable")?,
            ssid: get_string(ap, "ssid")?,
            password: get_string(ap, "pass")?,
        });
    }
    Ok((wifi != WifiConfig::default()).then_some(wifi))
}

fn extract_mqtt(root: &Map<String, Value>) -> Extracted<MqttConfig> {
    let Some(wire) = section(root, "mqtt")? else {
        return Ok(None);
    };
    let (server, port) = match get_string(wire, "server")? {
        Some(joined) => {
            let (host, port) = split_host_port(&joined)?;
            (Some(host), port)
        }
        None => (None, None),
    };
    Ok(Some(MqttConfig {
        enabled: get_bool(wire, "enable")?,
        server,
        port,
        username: get_string(wire, "user")?,
        password: get_string(wire, "pass")?,
        client_id: get_string(wire, "client_id")?,
        clean_session: None,
        keep_alive: None,
        qos: None,
        retain: None,
    }))
}

fn extract_auth(root: &Map<String, Value>) -> Extracted<AuthConfig> {
    let Some(wire) = section(root, "auth")? else {
        return Ok(None);
    };
    Ok(Some(AuthConfig {
        enabled: get_bool(wire, "enable")?,
        username: get_string(wire, "user")?,
        password: get_string(wire, "pass")?,
    }))
}

fn extract_cloud(root: &Map<String, Value>) -> Extracted<CloudConfig> {
    let Some(wire) = section(root, "cloud")? else {
        return Ok(None);
    };
    Ok(Some(CloudConfig {
        enabled: get_bool(wire, "enable")?,
        server: get_string(wire, "server")?,
    }))
}

fn extract_eth(root: &Map<String, Value>) -> Extracted<NetworkConfig> {
    let Some(wire) = section(root, "eth")? else {
        return Ok(None);
    };
    Ok(Some(NetworkConfig {
        enabled: get_bool(wire, "enable")?,
        ipv4_method: get_string(wire, "ipv4mode")?,
        ip: get_string(wire, "ip")?,
        netmask: get_string(wire, "netmask")?,
        gateway: get_string(wire, "gw")?,
        dns: get_string(wire, "nameserver")?,
    }))
}

/// Collect `switch:N` components ordered by channel index. The power
/// limit rides on channel 0 and surfaces as the metering section.
fn extract_switches(
    root: &Map<String, Value>,
) -> std::result::Result<(Option<RelayConfig>, Option<PowerMeteringConfig>), String> {
    let mut indexed = component_keys(root, "switch:")?;
    if indexed.is_empty() {
        return Ok((None, None));
    }
    indexed.sort_by_key(|(index, _)| *index);

    let mut relays = Vec::with_capacity(indexed.len());
    let mut power_metering = None;
    for (index, wire) in indexed {
        relays.push(RelayChannel {
            id: Some(index),
            name: get_string(wire, "name")?,
            default_state: get_string(wire, "initial_state")?,
            auto_on: read_timer(wire, "auto_on")?,
            auto_off: read_timer(wire, "auto_off")?,
            schedule: None,
        });
        if index == 0 {
            power_metering = get_f64(wire, "power_limit")?.map(|max_power| PowerMeteringConfig {
                max_power: Some(max_power),
            });
        }
    }
    Ok((Some(RelayConfig { relays }), power_metering))
}

fn extract_inputs(root: &Map<String, Value>) -> Extracted<InputConfig> {
    let mut indexed = component_keys(root, "input:")?;
    if indexed.is_empty() {
        return Ok(None);
    }
    indexed.sort_by_key(|(index, _)| *index);

    let mut inputs = Vec::with_capacity(indexed.len());
    for (index, wire) in indexed {
        inputs.push(InputChannel {
            id: Some(index),
            name: get_string(wire, "name")?,
            input_type: get_string(wire, "type")?,
            invert: get_bool(wire, "invert")?,
        });
    }
    Ok(Some(InputConfig { inputs }))
}

fn extract_cover(root: &Map<String, Value>) -> Extracted<RollerConfig> {
    let Some(wire) = section(root, "cover:0")? else {
        return Ok(None);
    };
    Ok(Some(RollerConfig {
        maxtime_open: get_f64(wire, "maxtime_open")?,
        maxtime_close: get_f64(wire, "maxtime_close")?,
        default_state: get_string(wire, "initial_state")?,
        swap: get_bool(wire, "invert_directions")?,
        positioning: None,
    }))
}

fn extract_light(root: &Map<String, Value>) -> Extracted<DimmingConfig> {
    let Some(wire) = section(root, "light:0")? else {
        return Ok(None);
    };
    Ok(Some(DimmingConfig {
        min_brightness: get_u8(wire, "min_brightness")?,
        max_brightness: get_u8(wire, "max_brightness")?,
        fade_rate: get_u8(wire, "fade_rate")?,
        leading_edge: get_bool(wire, "leading_edge")?,
    }))
}

fn component_keys<'a>(
    root: &'a Map<String, Value>,
    prefix: &str,
) -> std::result::Result<Vec<(u32, &'a Map<String, Value>)>, String> {
    let mut out = Vec::new();
    for (key, value) in root {
        let Some(index_str) = key.strip_prefix(prefix) else {
            continue;
        };
        let index: u32 = index_str
            .parse()
            .map_err(|_| format!("'{}' has an invalid channel index", key))?;
        let Some(map) = value.as_object() else {
            return Err(format!("'{}' is not an object", key));
        };
        out.push((index, map));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::ConfigConverter;
    use super::*;
    use domain::ConfigError;
    use serde_json::json;

    fn plus_1pm_config() -> Value {
        json!({
            "sys": {
                "device": {"name": "office-switch", "mac": "AABBCCDDEEFF", "fw_id": "20231219", "eco_mode": false},
                "location": {"tz": "Europe/Sofia", "lat": 42.6977, "lon": 23.3219},
                "sntp": {"server": "time.google.com"}
            },
            "wifi": {
                "sta": {"enable": true, "ssid": "Office", "ipv4mode": "dhcp"},
                "ap": {"enable": false, "ssid": "ShellyPlus1PM-EEFF"}
            },
            "mqtt": {"enable": true, "server": "10.0.0.5:8883", "user": "fleet", "client_id": "plus1pm-eeff"},
            "cloud": {"enable": false},
            "ble": {"enable": true},
            "switch:0": {
                "name": "Office light",
                "initial_state": "last",
                "auto_on": false,
                "auto_off": true,
                "auto_off_delay": 1800.0,
                "power_limit": 2000.0
            },
            "input:0": {"name": "Wall switch", "type": "toggle", "invert": false}
        })
    }

    #[test]
    fn test_from_wire_plus_1pm() {
        let config = Gen2Converter
            .from_wire(&plus_1pm_config(), "SNSW-001P16EU")
            .unwrap();

        assert_eq!(
            config.system.as_ref().unwrap().device_name.as_deref(),
            Some("office-switch")
        );
        assert_eq!(config.location.as_ref().unwrap().lng, Some(23.3219));
        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.server.as_deref(), Some("10.0.0.5"));
        assert_eq!(mqtt.port, Some(8883));

        let relays = &config.relay.as_ref().unwrap().relays;
        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].auto_on, Some(0.0));
        assert_eq!(relays[0].auto_off, Some(1800.0));
        assert_eq!(
            config.power_metering.as_ref().unwrap().max_power,
            Some(2000.0)
        );
        // Gen2 has no CoIoT or LED representation
        assert!(config.coiot.is_none());
        assert!(config.led.is_none());
    }

    #[test]
    fn test_round_trip_preserves_typed_fields() {
        let converter = Gen2Converter;
        let config = converter
            .from_wire(&plus_1pm_config(), "SNSW-001P16EU")
            .unwrap();
        let wire = converter.to_wire(&config, "SNSW-001P16EU").unwrap();
        let back = converter.from_wire(&wire, "SNSW-001P16EU").unwrap();
        assert_eq!(back, config);

        // Read-only device identity never reaches the output
        assert!(wire["sys"]["device"].get("mac").is_none());
        assert!(wire["sys"]["device"].get("fw_id").is_none());
        assert!(wire.get("ble").is_none());
    }

    #[test]
    fn test_timer_pair_encoding() {
        let mut wire = Map::new();
        write_timer(&mut wire, "auto_off", Some(300.0));
        assert_eq!(wire["auto_off"], json!(true));
        assert_eq!(wire["auto_off_delay"], json!(300.0));

        let mut wire = Map::new();
        write_timer(&mut wire, "auto_off", Some(0.0));
        assert_eq!(wire["auto_off"], json!(false));
        assert!(!wire.contains_key("auto_off_delay"));

        let mut wire = Map::new();
        write_timer(&mut wire, "auto_off", None);
        assert!(wire.is_empty());
    }

    #[test]
    fn test_input_only_model_masks_switches() {
        let config = DeviceConfiguration {
            relay: Some(RelayConfig {
                relays: vec![RelayChannel {
                    name: Some("bogus".to_string()),
                    ..Default::default()
                }],
            }),
            input: Some(InputConfig {
                inputs: (0..4)
                    .map(|i| InputChannel {
                        id: Some(i),
                        name: Some(format!("Button {}", i + 1)),
                        input_type: Some("momentary".to_string()),
                        invert: None,
                    })
                    .collect(),
            }),
            ..Default::default()
        };

        let wire = Gen2Converter.to_wire(&config, "SNSN-0024X").unwrap();
        let wire_obj = wire.as_object().unwrap();
        assert!(!wire_obj.contains_key("switch:0"));
        assert!(wire_obj.contains_key("input:0"));
        assert!(wire_obj.contains_key("input:3"));
    }

    #[test]
    fn test_sparse_switch_indices_keep_channel_ids() {
        let raw = json!({
            "switch:0": {"name": "A"},
            "switch:1": {"name": "B"}
        });
        let config = Gen2Converter.from_wire(&raw, "SNSW-102P16EU").unwrap();
        let relays = config.relay.unwrap().relays;
        assert_eq!(relays[0].id, Some(0));
        assert_eq!(relays[1].id, Some(1));
        assert_eq!(relays[1].name.as_deref(), Some("B"));
    }

    #[test]
    fn test_malformed_component_names_section() {
        let raw = json!({"mqtt": {"server": true}});
        let err = Gen2Converter.from_wire(&raw, "SNSW-001X16EU").unwrap_err();
        match err {
            ConfigError::Conversion { section, .. } => assert_eq!(section, "mqtt"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_ethernet_only_for_pro_models() {
        let config = DeviceConfiguration {
            network: Some(NetworkConfig {
                enabled: Some(true),
                ipv4_method: Some("dhcp".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let plus = Gen2Converter.to_wire(&config, "SNSW-001X16EU").unwrap();
        assert!(plus.as_object().unwrap().get("eth").is_none());

        let pro = Gen2Converter.to_wire(&config, "SPSW-201XE16EU").unwrap();
        assert_eq!(pro["eth"]["enable"], json!(true));
    }
}
