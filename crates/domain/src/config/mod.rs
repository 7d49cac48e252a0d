//! Typed device configuration model.
//!
//! Every leaf is tri-state: absent (inherit), explicitly set, or set to a
//! zero value. Serialization omits absent leaves entirely.

mod model;
pub mod optional;

pub use model::{
    AccessPointConfig, AuthConfig, CloudConfig, CoIotConfig, DeviceConfiguration, DimmingConfig,
    InputChannel, InputConfig, LedConfig, LocationConfig, MqttConfig, NetworkConfig,
    PowerMeteringConfig, RelayChannel, RelayConfig, RollerConfig, SystemConfig, WifiConfig,
};
