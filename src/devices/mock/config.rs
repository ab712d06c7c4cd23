//! Simulated bus configuration
//!
//! ```toml
//! [bus]
//! type = "mock"
//!
//! [bus.mock]
//! noise_stddev = 8.0   # raw counts added to channel readings
//! nack_rate = 0.0      # probability a transfer is not acknowledged
//! random_seed = 42     # 0 = random each run
//!
//! [[bus.mock.devices]]
//! bus = 1
//! type = "bar"         # address defaults to the type's factory address
//!
//! [[bus.mock.devices]]
//! bus = 1
//! type = "square"
//! address = 0x2A
//! ```

use crate::core::types::DeviceType;
use serde::Deserialize;

/// Simulated bus parameters
#[derive(Debug, Clone, Deserialize)]
pub struct MockBusConfig {
    /// Devices answering on the simulated buses
    #[serde(default = "default_devices")]
    pub devices: Vec<MockDeviceConfig>,

    /// Gaussian noise on channel readings (raw counts)
    #[serde(default)]
    pub noise_stddev: f32,

    /// Probability (0.0-1.0) that a transfer fails
    #[serde(default)]
    pub nack_rate: f32,

    /// Noise seed (0 = entropy)
    #[serde(default)]
    pub random_seed: u64,
}

fn default_devices() -> Vec<MockDeviceConfig> {
    vec![
        MockDeviceConfig::new(1, DeviceType::Bar),
        MockDeviceConfig::new(1, DeviceType::Square),
    ]
}

impl Default for MockBusConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            noise_stddev: 0.0,
            nack_rate: 0.0,
            random_seed: 0,
        }
    }
}

/// One simulated device
#[derive(Debug, Clone, Deserialize)]
pub struct MockDeviceConfig {
    #[serde(default = "default_bus")]
    pub bus: u8,

    #[serde(rename = "type")]
    pub device_type: DeviceType,

    /// Defaults to the type's factory address
    #[serde(default)]
    pub address: Option<u8>,

    #[serde(default = "default_firmware_version")]
    pub firmware_version: u8,
}

fn default_bus() -> u8 {
    1
}
fn default_firmware_version() -> u8 {
    3
}

impl MockDeviceConfig {
    pub fn new(bus: u8, device_type: DeviceType) -> Self {
        Self {
            bus,
            device_type,
            address: None,
            firmware_version: default_firmware_version(),
        }
    }

    /// Configured address, or the factory address for the type
    pub fn resolved_address(&self) -> Option<u8> {
        self.address.or(self.device_type.default_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MockBusConfig::default();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].resolved_address(), Some(0x20));
        assert_eq!(config.devices[1].resolved_address(), Some(0x28));
        assert_eq!(config.noise_stddev, 0.0);
    }

    #[test]
    fn test_parse_devices() {
        let config: MockBusConfig = toml::from_str(
            r#"
            random_seed = 7
            [[devices]]
            type = "craft"
            [[devices]]
            bus = 2
            type = "ring"
            address = 0x3A
            "#,
        )
        .unwrap();

        assert_eq!(config.random_seed, 7);
        assert_eq!(config.devices[0].bus, 1);
        assert_eq!(config.devices[0].resolved_address(), Some(0x30));
        assert_eq!(config.devices[1].device_type, DeviceType::Ring);
        assert_eq!(config.devices[1].resolved_address(), Some(0x3A));
    }

    #[test]
    fn test_unknown_without_address_unresolved() {
        let device = MockDeviceConfig::new(1, DeviceType::Unknown);
        assert_eq!(device.resolved_address(), None);
    }
}
