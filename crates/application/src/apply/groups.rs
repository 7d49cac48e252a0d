//! Decomposition of a wire document into independently-applied settings
//! groups. Groups go to the device in a stable declared order, but no
//! group depends on an earlier group's success.

use domain::client::Generation;
use serde_json::{Map, Value};

/// Stable apply order.
pub const GROUP_ORDER: &[&str] = &[
    "wifi",
    "mqtt",
    "auth",
    "cloud",
    "coiot",
    "system",
    "location",
    "network",
    "relay",
    "power_metering",
    "dimming",
    "roller",
    "input",
    "led",
];

/// Split a converter-produced wire document into ordered (group, payload)
/// pairs. Empty groups are dropped.
pub fn split_into_groups(wire: &Value, dialect: Generation) -> Vec<(String, Value)> {
    let Some(root) = wire.as_object() else {
        return Vec::new();
    };

    let mut grouped: Vec<(String, Map<String, Value>)> = GROUP_ORDER
        .iter()
        .map(|g| (g.to_string(), Map::new()))
        .collect();

    for (key, value) in root {
        let group = match dialect.wire_dialect() {
            Generation::Gen1 => gen1_group(key),
            _ => gen2_group(key),
        };
        if let Some(slot) = grouped.iter_mut().find(|(name, _)| name == group) {
            slot.1.insert(key.clone(), value.clone());
        }
    }

    grouped
        .into_iter()
        .filter(|(_, payload)| !payload.is_empty())
        .map(|(name, payload)| (name, Value::Object(payload)))
        .collect()
}

fn gen1_group(key: &str) -> &'static str {
    match key {
        "wifi_sta" | "wifi_ap" => "wifi",
        "mqtt" => "mqtt",
        "login" => "auth",
        "cloud" => "cloud",
        "coiot" => "coiot",
        "name" | "eco_mode_enabled" | "discoverable" | "sntp" => "system",
        "timezone" | "lat" | "lng" => "location",
        "relays" => "relay",
        "max_power" => "power_metering",
        "min_brightness" | "max_brightness" | "fade_rate" | "leading_edge" => "dimming",
        "rollers" => "roller",
        "inputs" => "input",
        "led_power_disable" | "led_status_disable" => "led",
        _ => "system",
    }
}

fn gen2_group(key: &str) -> &'static str {
    if key.starts_with("switch:") {
        return "relay";
    }
    if key.starts_with("input:") {
        return "input";
    }
    if key.starts_with("cover:") {
        return "roller";
    }
    if key.starts_with("light:") {
        return "dimming";
    }
    match key {
        "wifi" => "wifi",
        "mqtt" => "mqtt",
        "auth" => "auth",
        "cloud" => "cloud",
        "eth" => "network",
        _ => "system",
    }
}
