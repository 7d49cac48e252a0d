//! Per-model capability masks. The converter uses these to decide which
//! sections a device physically has; emitting `max_power` at a plain
//! switch or an LED block at an input-only module would be rejected or,
//! worse, silently accepted.

/// What one hardware model can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub relay_count: u8,
    pub input_count: u8,
    pub power_metering: bool,
    pub dimming: bool,
    pub roller: bool,
    pub led_control: bool,
    pub ethernet: bool,
}

impl DeviceCapabilities {
    /// Mask for models we have no table entry for: emit everything the
    /// desired config carries and let the device drop what it lacks.
    pub const fn permissive() -> Self {
        Self {
            relay_count: 8,
            input_count: 8,
            power_metering: true,
            dimming: true,
            roller: true,
            led_control: true,
            ethernet: true,
        }
    }

    const fn relay(relays: u8, inputs: u8, metering: bool, led: bool) -> Self {
        Self {
            relay_count: relays,
            input_count: inputs,
            power_metering: metering,
            dimming: false,
            roller: false,
            led_control: led,
            ethernet: false,
        }
    }
}

/// Known gen1 models
pub const GEN1_DEVICE_TYPES: &[&str] = &[
    "SHSW-1", "SHSW-PM", "SHSW-25", "SHPLG-S", "SHPLG2-1", "SHDM-1", "SHDM-2", "SHIX3-1",
];

/// Known gen2/gen3 models
pub const GEN2_DEVICE_TYPES: &[&str] = &[
    "SNSW-001X16EU",
    "SNSW-001P16EU",
    "SNSW-102P16EU",
    "SNPL-00112EU",
    "SNSN-0024X",
    "SPSW-201XE16EU",
];

pub fn for_device_type(device_type: &str) -> DeviceCapabilities {
    match device_type {
        // Gen1
        "SHSW-1" => DeviceCapabilities::relay(1, 1, false, false),
        "SHSW-PM" => DeviceCapabilities::relay(1, 1, true, true),
        "SHSW-25" => DeviceCapabilities {
            roller: true,
            ..DeviceCapabilities::relay(2, 2, true, true)
        },
        "SHPLG-S" | "SHPLG2-1" => DeviceCapabilities::relay(1, 0, true, true),
        "SHDM-1" | "SHDM-2" => DeviceCapabilities {
            dimming: true,
            power_metering: true,
            ..DeviceCapabilities::relay(0, 2, true, false)
        },
        "SHIX3-1" => DeviceCapabilities::relay(0, 3, false, false),

        // Gen2 / gen3
        "SNSW-001X16EU" => DeviceCapabilities::relay(1, 1, false, false),
        "SNSW-001P16EU" => DeviceCapabilities::relay(1, 1, true, false),
        "SNSW-102P16EU" => DeviceCapabilities {
            roller: true,
            ..DeviceCapabilities::relay(2, 2, true, false)
        },
        "SNPL-00112EU" => DeviceCapabilities::relay(1, 0, true, true),
        "SNSN-0024X" => DeviceCapabilities::relay(0, 4, false, false),
        "SPSW-201XE16EU" => DeviceCapabilities {
            ethernet: true,
            ..DeviceCapabilities::relay(2, 2, true, false)
        },

        _ => DeviceCapabilities::permissive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plug_has_metering_but_no_inputs() {
        let caps = for_device_type("SHPLG-S");
        assert_eq!(caps.relay_count, 1);
        assert_eq!(caps.input_count, 0);
        assert!(caps.power_metering);
        assert!(caps.led_control);
    }

    #[test]
    fn test_input_module_has_nothing_but_inputs() {
        let caps = for_device_type("SHIX3-1");
        assert_eq!(caps.relay_count, 0);
        assert_eq!(caps.input_count, 3);
        assert!(!caps.power_metering);
        assert!(!caps.led_control);
        assert!(!caps.dimming);
    }

    #[test]
    fn test_unknown_model_is_permissive() {
        assert_eq!(
            for_device_type("SH-FUTURE-9"),
            DeviceCapabilities::permissive()
        );
    }

    #[test]
    fn test_known_lists_have_table_entries() {
        for dt in GEN1_DEVICE_TYPES.iter().chain(GEN2_DEVICE_TYPES) {
            assert_ne!(
                for_device_type(dt),
                DeviceCapabilities::permissive(),
                "{} fell through to the permissive mask",
                dt
            );
        }
    }
}
