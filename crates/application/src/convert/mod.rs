//! Bidirectional converters between the typed model and each generation's
//! wire dialect.
//!
//! `from_wire` extracts section by section and drops unknown fields
//! silently; a malformed section aborts with an error naming it.
//! `to_wire` emits only leaves that are set, never read-only device keys,
//! and filters sections through the model's capability mask.

pub mod capabilities;
mod gen1;
mod gen2;

pub use capabilities::{DeviceCapabilities, for_device_type};
pub use gen1::Gen1Converter;
pub use gen2::Gen2Converter;

use domain::DeviceConfiguration;
use domain::client::Generation;
use domain::error::{ConfigError, Result};
use serde_json::{Map, Value};

pub trait ConfigConverter: Send + Sync {
    fn generation(&self) -> Generation;

    /// Models this converter has a capability entry for. Unknown models
    /// still convert, under the permissive mask.
    fn supported_device_types(&self) -> &'static [&'static str];

    fn from_wire(&self, raw: &Value, device_type: &str) -> Result<DeviceConfiguration>;

    fn to_wire(&self, config: &DeviceConfiguration, device_type: &str) -> Result<Value>;
}

/// Dispatch table over the wire dialects. Gen3 devices speak the gen2
/// dialect.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    gen1: Gen1Converter,
    gen2: Gen2Converter,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_generation(&self, generation: Generation) -> &dyn ConfigConverter {
        match generation.wire_dialect() {
            Generation::Gen1 => &self.gen1,
            _ => &self.gen2,
        }
    }
}

pub(crate) fn conversion_error(section: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Conversion {
        section: section.to_string(),
        reason: reason.into(),
    }
}

/// Split a wire "host:port" value. A bare host is legal; a malformed port
/// is not.
pub(crate) fn split_host_port(raw: &str) -> std::result::Result<(String, Option<u16>), String> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("'{}' has an invalid port", raw))?;
            Ok((host.to_string(), Some(port)))
        }
        None => Ok((raw.to_string(), None)),
    }
}

pub(crate) fn join_host_port(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

// --- Wire map readers -------------------------------------------------
//
// Absent or null means "not set"; a present value of the wrong shape is a
// wire error the caller wraps with its section name.

pub(crate) type FieldResult<T> = std::result::Result<Option<T>, String>;

pub(crate) fn section<'a>(root: &'a Map<String, Value>, key: &str) -> FieldResult<&'a Map<String, Value>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(format!("'{}' is not an object", key)),
    }
}

pub(crate) fn get_bool(map: &Map<String, Value>, key: &str) -> FieldResult<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(format!("'{}' is not a boolean", key)),
    }
}

pub(crate) fn get_string(map: &Map<String, Value>, key: &str) -> FieldResult<String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("'{}' is not a string", key)),
    }
}

pub(crate) fn get_f64(map: &Map<String, Value>, key: &str) -> FieldResult<f64> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("'{}' is not a number", key)),
        Some(_) => Err(format!("'{}' is not a number", key)),
    }
}

pub(crate) fn get_u32(map: &Map<String, Value>, key: &str) -> FieldResult<u32> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| format!("'{}' is not an unsigned integer", key)),
        Some(_) => Err(format!("'{}' is not an unsigned integer", key)),
    }
}

pub(crate) fn get_u8(map: &Map<String, Value>, key: &str) -> FieldResult<u8> {
    match get_u32(map, key)? {
        None => Ok(None),
        Some(v) => u8::try_from(v)
            .map(Some)
            .map_err(|_| format!("'{}' is out of range", key)),
    }
}

// --- Wire map writer --------------------------------------------------

/// Insert only when the leaf is set; absent leaves never reach the wire.
pub(crate) fn set_opt<T>(map: &mut Map<String, Value>, key: &str, value: Option<T>)
where
    Value: From<T>,
{
    if let Some(v) = value {
        map.insert(key.to_string(), Value::from(v));
    }
}

pub(crate) fn insert_object(map: &mut Map<String, Value>, key: &str, object: Map<String, Value>) {
    if !object.is_empty() {
        map.insert(key.to_string(), Value::Object(object));
    }
}

pub(crate) fn as_object(raw: &Value) -> Result<&Map<String, Value>> {
    raw.as_object()
        .ok_or_else(|| conversion_error("root", "wire payload is not a JSON object"))
}
