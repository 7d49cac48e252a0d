//! Converter for the generation-1 flat settings dialect.
//!
//! The gen1 wire is one big JSON document with a handful of quirks this
//! module owns: MQTT server is a joined "host:port" string, the LED keys
//! are inverted (`led_power_disable`), WiFi credentials travel as `key`,
//! the auth section is called `login` and relay/input settings are
//! positional arrays. Read-only keys (`device`, `hwinfo`, `fw`, `time`,
//! `unixtime`, `serial`, `has_update`, `mac`, `cfg_changed_cnt`,
//! `actions_stats`) are accepted on input and never emitted.

use domain::DeviceConfiguration;
use domain::client::Generation;
use domain::config::{
    AccessPointConfig, AuthConfig, CloudConfig, CoIotConfig, DimmingConfig, InputChannel,
    InputConfig, LedConfig, LocationConfig, MqttConfig, PowerMeteringConfig, RelayChannel,
    RelayConfig, RollerConfig, SystemConfig, WifiConfig,
};
use domain::error::Result;
use serde_json::{Map, Value};

use super::capabilities::{self, GEN1_DEVICE_TYPES};
use super::{
    FieldResult, as_object, conversion_error, get_bool, get_f64, get_string, get_u8, get_u32,
    insert_object, join_host_port, section, set_opt, split_host_port,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Gen1Converter;

impl super::ConfigConverter for Gen1Converter {
    fn generation(&self) -> Generation {
        Generation::Gen1
    }

    fn supported_device_types(&self) -> &'static [&'static str] {
        GEN1_DEVICE_TYPES
    }

    fn from_wire(&self, raw: &Value, _device_type: &str) -> Result<DeviceConfiguration> {
        let root = as_object(raw)?;

        Ok(DeviceConfiguration {
            wifi: extract_wifi(root)?,
            mqtt: extract_mqtt(root).map_err(|r| conversion_error("mqtt", r))?,
            auth: extract_login(root).map_err(|r| conversion_error("login", r))?,
            system: extract_system(root).map_err(|r| conversion_error("system", r))?,
            network: None,
            cloud: extract_cloud(root).map_err(|r| conversion_error("cloud", r))?,
            location: extract_location(root).map_err(|r| conversion_error("location", r))?,
            coiot: extract_coiot(root).map_err(|r| conversion_error("coiot", r))?,
            relay: extract_relays(root).map_err(|r| conversion_error("relays", r))?,
            power_metering: extract_power(root).map_err(|r| conversion_error("max_power", r))?,
            dimming: extract_dimming(root).map_err(|r| conversion_error("dimming", r))?,
            roller: extract_rollers(root).map_err(|r| conversion_error("rollers", r))?,
            input: extract_inputs(root).map_err(|r| conversion_error("inputs", r))?,
            led: extract_led(root).map_err(|r| conversion_error("led", r))?,
        })
    }

    fn to_wire(&self, config: &DeviceConfiguration, device_type: &str) -> Result<Value> {
        let caps = capabilities::for_device_type(device_type);
        let mut root = Map::new();

        if let Some(wifi) = &config.wifi {
            let mut sta = Map::new();
            set_opt(&mut sta, "enabled", wifi.enabled);
            set_opt(&mut sta, "ssid", wifi.ssid.clone());
            set_opt(&mut sta, "key", wifi.password.clone());
            set_opt(&mut sta, "ipv4_method", wifi.ipv4_method.clone());
            set_opt(&mut sta, "ip", wifi.ip.clone());
            set_opt(&mut sta, "netmask", wifi.netmask.clone());
            set_opt(&mut sta, "gw", wifi.gateway.clone());
            set_opt(&mut sta, "dns", wifi.dns.clone());
            insert_object(&mut root, "wifi_sta", sta);

            if let Some(ap) = &wifi.access_point {
                let mut wire_ap = Map::new();
                set_opt(&mut wire_ap, "enabled", ap.enabled);
                set_opt(&mut wire_ap, "ssid", ap.ssid.clone());
                set_opt(&mut wire_ap, "key", ap.password.clone());
                insert_object(&mut root, "wifi_ap", wire_ap);
            }
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
            set_opt(&mut wire, "id", mqtt.client_id.clone());
            set_opt(&mut wire, "clean_session", mqtt.clean_session);
            set_opt(&mut wire, "keep_alive", mqtt.keep_alive);
            set_opt(&mut wire, "max_qos", mqtt.qos);
            set_opt(&mut wire, "retain", mqtt.retain);
            insert_object(&mut root, "mqtt", wire);
        }

        if let Some(auth) = &config.auth {
            let mut wire = Map::new();
            set_opt(&mut wire, "enabled", auth.enabled);
            set_opt(&mut wire, "username", auth.username.clone());
            set_opt(&mut wire, "password", auth.password.clone());
            insert_object(&mut root, "login", wire);
        }

        if let Some(system) = &config.system {
            set_opt(&mut root, "name", system.device_name.clone());
            set_opt(&mut root, "eco_mode_enabled", system.eco_mode);
            set_opt(&mut root, "discoverable", system.discoverable);
            let mut sntp = Map::new();
            set_opt(&mut sntp, "server", system.sntp_server.clone());
            insert_object(&mut root, "sntp", sntp);
        }

        if let Some(cloud) = &config.cloud {
            let mut wire = Map::new();
            set_opt(&mut wire, "enabled", cloud.enabled);
            set_opt(&mut wire, "server", cloud.server.clone());
            insert_object(&mut root, "cloud", wire);
        }

        if let Some(location) = &config.location {
            set_opt(&mut root, "timezone", location.tz.clone());
            set_opt(&mut root, "lat", location.lat);
            set_opt(&mut root, "lng", location.lng);
        }

        if let Some(coiot) = &config.coiot {
            let mut wire = Map::new();
            set_opt(&mut wire, "enabled", coiot.enabled);
            set_opt(&mut wire, "update_period", coiot.update_period);
            set_opt(&mut wire, "peer", coiot.peer.clone());
            insert_object(&mut root, "coiot", wire);
        }

        if caps.relay_count > 0 {
            if let Some(relay) = &config.relay {
                let wire_relays: Vec<Value> = relay
                    .relays
                    .iter()
                    .take(caps.relay_count as usize)
                    .map(|channel| {
                        let mut wire = Map::new();
                        set_opt(&mut wire, "name", channel.name.clone());
                        set_opt(&mut wire, "default_state", channel.default_state.clone());
                        set_opt(&mut wire, "auto_on", channel.auto_on);
                        set_opt(&mut wire, "auto_off", channel.auto_off);
                        set_opt(&mut wire, "schedule", channel.schedule);
                        Value::Object(wire)
                    })
                    .collect();
                if !wire_relays.is_empty() {
                    root.insert("relays".to_string(), Value::Array(wire_relays));
                }
            }
        }

        if caps.power_metering {
            if let Some(power) = &config.power_metering {
                set_opt(&mut root, "max_power", power.max_power);
            }
        }

        if caps.dimming {
            if let Some(dimming) = &config.dimming {
                set_opt(&mut root, "min_brightness", dimming.min_brightness);
                set_opt(&mut root, "max_brightness", dimming.max_brightness);
                set_opt(&mut root, "fade_rate", dimming.fade_rate);
                set_opt(&mut root, "leading_edge", dimming.leading_edge);
            }
        }

        if caps.roller {
            if let Some(roller) = &config.roller {
                let mut wire = Map::new();
                set_opt(&mut wire, "maxtime_open", roller.maxtime_open);
                set_opt(&mut wire, "maxtime_close", roller.maxtime_close);
                set_opt(&mut wire, "default_state", roller.default_state.clone());
                set_opt(&mut wire, "swap", roller.swap);
                set_opt(&mut wire, "positioning", roller.positioning);
                if !wire.is_empty() {
                    root.insert("rollers".to_string(), Value::Array(vec![Value::Object(wire)]));
                }
            }
        }

        if caps.input_count > 0 {
            if let Some(input) = &config.input {
                let wire_inputs: Vec<Value> = input
                    .inputs
                    .iter()
                    .take(caps.input_count as usize)
                    .map(|channel| {
                        let mut wire = Map::new();
                        set_opt(&mut wire, "name", channel.name.clone());
                        set_opt(&mut wire, "type", channel.input_type.clone());
                        set_opt(&mut wire, "invert", channel.invert);
                        Value::Object(wire)
                    })
                    .collect();
                if !wire_inputs.is_empty() {
                    root.insert("inputs".to_string(), Value::Array(wire_inputs));
                }
            }
        }

        if caps.led_control {
            if let Some(led) = &config.led {
                set_opt(&mut root, "led_power_disable", led.power_indication.map(|b| !b));
                set_opt(
                    &mut root,
                    "led_status_disable",
                    led.network_indication.map(|b| !b),
                );
            }
        }

        Ok(Value::Object(root))
    }
}

fn extract_wifi(root: &Map<String, Value>) -> Result<Option<WifiConfig>> {
    let sta = section(root, "wifi_sta").map_err(|r| conversion_error("wifi_sta", r))?;
    let ap = section(root, "wifi_ap").map_err(|r| conversion_error("wifi_ap", r))?;
    if sta.is_none() && ap.is_none() {
        return Ok(None);
    }

    let mut wifi = WifiConfig::default();
    if let Some(sta) = sta {
        let read = |r: FieldResult<String>| r.map_err(|e| conversion_error("wifi_sta", e));
        wifi.enabled = get_bool(sta, "enabled").map_err(|r| conversion_error("wifi_sta", r))?;
        wifi.ssid = read(get_string(sta, "ssid"))?;
        wifi.password = read(get_string(sta, "key"))?;
        wifi.ipv4_method = read(get_string(sta, "ipv4_method"))?;
        wifi.ip = read(get_string(sta, "ip"))?;
        wifi.netmask = read(get_string(sta, "netmask"))?;
        wifi.gateway = read(get_string(sta, "gw"))?;
        wifi.dns = read(get_string(sta, "dns"))?;
    }
    if let Some(ap) = ap {
        let read = |r: FieldResult<String>| r.map_err(|e| conversion_error("wifi_ap", e));
        wifi.access_point = Some(AccessPointConfig {
            enabled: get_bool(ap, "enabled").map_err(|r| conversion_error("wifi_ap", r))?,
            ssid: read(get_string(ap, "ssid"))?,
            password: read(get_string(ap, "key"))?,
        });
    }
    Ok(Some(wifi))
}

fn extract_mqtt(root: &Map<String, Value>) -> std::result::Result<Option<MqttConfig>, String> {
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
        client_id: get_string(wire, "id")?,
        clean_session: get_bool(wire, "clean_session")?,
        keep_alive: get_u32(wire, "keep_alive")?,
        qos: get_u8(wire, "max_qos")?,
        retain: get_bool(wire, "retain")?,
    }))
}

fn extract_login(root: &Map<String, Value>) -> std::result::Result<Option<AuthConfig>, String> {
    let Some(wire) = section(root, "login")? else {
        return Ok(None);
    };
    Ok(Some(AuthConfig {
        enabled: get_bool(wire, "enabled")?,
        username: get_string(wire, "username")?,
        password: get_string(wire, "password")?,
    }))
}

fn extract_system(root: &Map<String, Value>) -> std::result::Result<Option<SystemConfig>, String> {
    let system = SystemConfig {
        device_name: get_string(root, "name")?,
        eco_mode: get_bool(root, "eco_mode_enabled")?,
        discoverable: get_bool(root, "discoverable")?,
        sntp_server: match section(root, "sntp")? {
            Some(sntp) => get_string(sntp, "server")?,
            None => None,
        },
        firmware_auto_update: None,
    };
    Ok((system != SystemConfig::default()).then_some(system))
}

fn extract_cloud(root: &Map<String, Value>) -> std::result::Result<Option<CloudConfig>, String> {
    let Some(wire) = section(root, "cloud")? else {
        return Ok(None);
    };
    // `connected` is live state, not configuration; it is dropped here.
    Ok(Some(CloudConfig {
        enabled: get_bool(wire, "enabled")?,
        server: get_string(wire, "server")?,
    }))
}

fn extract_location(
    root: &Map<String, Value>,
) -> std::result::Result<Option<LocationConfig>, String> {
    let location = LocationConfig {
        tz: get_string(root, "timezone")?,
        lat: get_f64(root, "lat")?,
        lng: get_f64(root, "lng")?,
    };
    Ok((location != LocationConfig::default()).then_some(location))
}

fn extract_coiot(root: &Map<String, Value>) -> std::result::Result<Option<CoIotConfig>, String> {
    let Some(wire) = section(root, "coiot")? else {
        return Ok(None);
    };
    Ok(Some(CoIotConfig {
        enabled: get_bool(wire, "enabled")?,
        update_period: get_u32(wire, "update_period")?,
        peer: get_string(wire, "peer")?,
    }))
}

fn extract_relays(root: &Map<String, Value>) -> std::result::Result<Option<RelayConfig>, String> {
    let Some(items) = get_array(root, "relays")? else {
        return Ok(None);
    };
    let mut relays = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(wire) = item.as_object() else {
            return Err(format!("element {} is not an object", index));
        };
        relays.push(RelayChannel {
            id: Some(index as u32),
            name: get_string(wire, "name")?,
            default_state: get_string(wire, "default_state")?,
            auto_on: get_f64(wire, "auto_on")?,
            auto_off: get_f64(wire, "auto_off")?,
            schedule: get_bool(wire, "schedule")?,
        });
    }
    Ok(Some(RelayConfig { relays }))
}

fn extract_inputs(root: &Map<String, Value>) -> std::result::Result<Option<InputConfig>, String> {
    let Some(items) = get_array(root, "inputs")? else {
        return Ok(None);
    };
    let mut inputs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(wire) = item.as_object() else {
            return Err(format!("element {} is not an object", index));
        };
        inputs.push(InputChannel {
            id: Some(index as u32),
            name: get_string(wire, "name")?,
            input_type: get_string(wire, "type")?,
            invert: get_bool(wire, "invert")?,
        });
    }
    Ok(Some(InputConfig { inputs }))
}

fn extract_power(
    root: &Map<String, Value>,
) -> std::result::Result<Option<PowerMeteringConfig>, String> {
    Ok(get_f64(root, "max_power")?.map(|max_power| PowerMeteringConfig {
        max_power: Some(max_power),
    }))
}

fn extract_dimming(
    root: &Map<String, Value>,
) -> std::result::Result<Option<DimmingConfig>, String> {
    let dimming = DimmingConfig {
        min_brightness: get_u8(root, "min_brightness")?,
        max_brightness: get_u8(root, "max_brightness")?,
        fade_rate: get_u8(root, "fade_rate")?,
        leading_edge: get_bool(root, "leading_edge")?,
    };
    Ok((dimming != DimmingConfig::default()).then_some(dimming))
}

fn extract_rollers(root: &Map<String, Value>) -> std::result::Result<Option<RollerConfig>, String> {
    let Some(items) = get_array(root, "rollers")? else {
        return Ok(None);
    };
    let Some(first) = items.first() else {
        return Ok(None);
    };
    let Some(wire) = first.as_object() else {
        return Err("element 0 is not an object".to_string());
    };
    Ok(Some(RollerConfig {
        maxtime_open: get_f64(wire, "maxtime_open")?,
        maxtime_close: get_f64(wire, "maxtime_close")?,
        default_state: get_string(wire, "default_state")?,
        swap: get_bool(wire, "swap")?,
        positioning: get_bool(wire, "positioning")?,
    }))
}

fn extract_led(root: &Map<String, Value>) -> std::result::Result<Option<LedConfig>, String> {
    let led = LedConfig {
        power_indication: get_bool(root, "led_power_disable")?.map(|b| !b),
        network_indication: get_bool(root, "led_status_disable")?.map(|b| !b),
    };
    Ok((led != LedConfig::default()).then_some(led))
}

fn get_array<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<&'a Vec<Value>>, String> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(format!("'{}' is not an array", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::ConfigConverter;
    use super::*;
    use domain::ConfigError;
    use serde_json::json;

    fn plug_settings() -> Value {
        json!({
            "device": {"type": "SHPLG-S", "mac": "AABBCC001122", "hostname": "shellyplug-s-1122"},
            "hwinfo": {"hw_revision": "prod-2019", "batch_id": 1},
            "fw": "20230913-112234/v1.14.0",
            "time": "16:20",
            "unixtime": 1726230000u32,
            "serial": 21,
            "has_update": false,
            "mac": "AABBCC001122",
            "cfg_changed_cnt": 3,
            "actions_stats": {"skipped": 0},
            "name": "kitchen-plug",
            "eco_mode_enabled": true,
            "discoverable": true,
            "timezone": "Europe/Berlin",
            "lat": 52.52,
            "lng": 13.405,
            "max_power": 2500.0,
            "led_power_disable": false,
            "led_status_disable": true,
            "wifi_sta": {"enabled": true, "ssid": "Lab", "key": "hunter2hunter2", "ipv4_method": "dhcp"},
            "wifi_ap": {"enabled": false, "ssid": "shellyplug-s-1122"},
            "mqtt": {
                "enable": true,
                "server": "192.168.1.100:1883",
                "user": "fleet",
                "id": "plug-1122",
                "clean_session": true,
                "keep_alive": 60
            },
            "login": {"enabled": true, "username": "admin", "password": "5tr0ng-Pa55"},
            "cloud": {"enabled": false, "connected": false},
            "coiot": {"enabled": true, "update_period": 15},
            "relays": [{"name": "Plug", "default_state": "last", "auto_on": 0.0, "auto_off": 0.0}]
        })
    }

    #[test]
    fn test_from_wire_plug() {
        let config = Gen1Converter
            .from_wire(&plug_settings(), "SHPLG-S")
            .unwrap();

        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.server.as_deref(), Some("192.168.1.100"));
        assert_eq!(mqtt.port, Some(1883));

        let led = config.led.as_ref().unwrap();
        assert_eq!(led.power_indication, Some(true));
        assert_eq!(led.network_indication, Some(false));

        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.enabled, Some(true));
        assert_eq!(auth.username.as_deref(), Some("admin"));

        assert_eq!(
            config.power_metering.as_ref().unwrap().max_power,
            Some(2500.0)
        );
        assert_eq!(config.location.as_ref().unwrap().tz.as_deref(), Some("Europe/Berlin"));
        assert_eq!(config.relay.as_ref().unwrap().relays[0].auto_off, Some(0.0));
    }

    #[test]
    fn test_plug_round_trip_drops_read_only_keys() {
        let converter = Gen1Converter;
        let config = converter.from_wire(&plug_settings(), "SHPLG-S").unwrap();
        let wire = converter.to_wire(&config, "SHPLG-S").unwrap();
        let wire_obj = wire.as_object().unwrap();

        assert_eq!(wire["mqtt"]["server"], json!("192.168.1.100:1883"));
        assert_eq!(wire["led_power_disable"], json!(false));
        assert_eq!(wire["led_status_disable"], json!(true));
        assert_eq!(wire["login"]["enabled"], json!(true));
        assert_eq!(wire["max_power"], json!(2500.0));

        for read_only in [
            "device",
            "hwinfo",
            "fw",
            "time",
            "unixtime",
            "serial",
            "has_update",
            "mac",
            "cfg_changed_cnt",
            "actions_stats",
        ] {
            assert!(
                !wire_obj.contains_key(read_only),
                "read-only key '{}' leaked into output",
                read_only
            );
        }
        // Live cloud connection state never comes back out either
        assert!(wire["cloud"].get("connected").is_none());
    }

    #[test]
    fn test_round_trip_preserves_typed_fields() {
        let converter = Gen1Converter;
        let config = converter.from_wire(&plug_settings(), "SHPLG-S").unwrap();
        let back = converter
            .from_wire(&converter.to_wire(&config, "SHPLG-S").unwrap(), "SHPLG-S")
            .unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_input_only_module_masks_relay_power_and_led() {
        // An i3 with bogus relay/power/LED sections: the capability mask
        // keeps them off the wire, and all three inputs are emitted.
        let config = DeviceConfiguration {
            input: Some(InputConfig {
                inputs: vec![
                    InputChannel {
                        id: Some(0),
                        name: Some("Top".to_string()),
                        input_type: Some("momentary".to_string()),
                        invert: None,
                    },
                    InputChannel {
                        id: Some(1),
                        name: Some("Middle".to_string()),
                        input_type: Some("toggle".to_string()),
                        invert: Some(false),
                    },
                    InputChannel {
                        id: Some(2),
                        name: Some("Bottom".to_string()),
                        input_type: Some("detached".to_string()),
                        invert: Some(true),
                    },
                ],
            }),
            relay: Some(RelayConfig {
                relays: vec![RelayChannel {
                    name: Some("bogus".to_string()),
                    ..Default::default()
                }],
            }),
            power_metering: Some(PowerMeteringConfig {
                max_power: Some(3500.0),
            }),
            led: Some(LedConfig {
                power_indication: Some(true),
                network_indication: Some(true),
            }),
            ..Default::default()
        };

        let wire = Gen1Converter.to_wire(&config, "SHIX3-1").unwrap();
        let wire_obj = wire.as_object().unwrap();

        assert_eq!(wire["inputs"].as_array().unwrap().len(), 3);
        assert!(!wire_obj.contains_key("relays"));
        assert!(!wire_obj.contains_key("max_power"));
        assert!(!wire_obj.contains_key("led_power_disable"));
        assert!(!wire_obj.contains_key("led_status_disable"));
    }

    #[test]
    fn test_input_only_module_keeps_typed_sections_on_import() {
        let raw = json!({
            "device": {"type": "SHIX3-1"},
            "inputs": [
                {"name": "Top", "type": "momentary"},
                {"name": "Middle", "type": "toggle"},
                {"name": "Bottom", "type": "detached"}
            ]
        });
        let config = Gen1Converter.from_wire(&raw, "SHIX3-1").unwrap();
        assert_eq!(config.input.as_ref().unwrap().inputs.len(), 3);
        assert!(config.relay.is_none());
        assert!(config.power_metering.is_none());
        assert!(config.led.is_none());
    }

    #[test]
    fn test_malformed_section_names_the_section() {
        let raw = json!({"mqtt": {"server": 1883}});
        let err = Gen1Converter.from_wire(&raw, "SHSW-1").unwrap_err();
        match err {
            ConfigError::Conversion { section, .. } => assert_eq!(section, "mqtt"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bare_mqtt_host_has_no_port() {
        let raw = json!({"mqtt": {"server": "broker.lan"}});
        let config = Gen1Converter.from_wire(&raw, "SHSW-1").unwrap();
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.server.as_deref(), Some("broker.lan"));
        assert_eq!(mqtt.port, None);

        let wire = Gen1Converter
            .to_wire(
                &DeviceConfiguration {
                    mqtt: Some(MqttConfig {
                        server: Some("broker.lan".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                "SHSW-1",
            )
            .unwrap();
        assert_eq!(wire["mqtt"]["server"], json!("broker.lan"));
    }

    #[test]
    fn test_relay_capability_truncates_extra_channels() {
        let config = DeviceConfiguration {
            relay: Some(RelayConfig {
                relays: vec![
                    RelayChannel {
                        name: Some("One".to_string()),
                        ..Default::default()
                    },
                    RelayChannel {
                        name: Some("Two".to_string()),
                        ..Default::default()
                    },
                ],
            }),
            ..Default::default()
        };
        let wire = Gen1Converter.to_wire(&config, "SHSW-1").unwrap();
        assert_eq!(wire["relays"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_absent_sections_emit_nothing() {
        let wire = Gen1Converter
            .to_wire(&DeviceConfiguration::default(), "SHPLG-S")
            .unwrap();
        assert_eq!(wire, json!({}));
    }
}
