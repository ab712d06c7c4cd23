//! Bus backends and sensor protocols
//!
//! - [`trill`]: Trill register protocol
//! - [`hal`]: `embedded-hal` I2C bus (Linux `/dev/i2c-N` with the `i2c` feature)
//! - [`mock`]: simulated bus with virtual sensors

pub mod hal;
pub mod mock;
pub mod trill;

use crate::config::{BusConfig, BusType};
use crate::core::bus::Bus;
use crate::error::Result;

/// Create the bus backend selected by configuration
pub fn create_bus(config: &BusConfig) -> Result<Box<dyn Bus>> {
    match config.bus_type {
        BusType::Mock => {
            log::info!(
                "Using simulated bus with {} device(s)",
                config.mock.devices.len()
            );
            Ok(Box::new(mock::MockBus::from_config(&config.mock)))
        }
        BusType::I2c => create_i2c_bus(config),
    }
}

#[cfg(all(target_os = "linux", feature = "i2c"))]
fn create_i2c_bus(config: &BusConfig) -> Result<Box<dyn Bus>> {
    log::info!("Using I2C buses at {}", config.device_path);
    Ok(Box::new(hal::HalBus::linux(&config.device_path)))
}

#[cfg(not(all(target_os = "linux", feature = "i2c")))]
fn create_i2c_bus(_config: &BusConfig) -> Result<Box<dyn Bus>> {
    Err(crate::error::Error::Config(
        "I2C support not built in (enable the `i2c` feature on Linux) - use bus type \"mock\""
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_bus() {
        let config = BusConfig {
            bus_type: BusType::Mock,
            ..Default::default()
        };
        let mut bus = create_bus(&config).unwrap();
        // Default mock devices: bar at 0x20, square at 0x28 on bus 1
        assert!(bus.write(1, 0x20, &[0x04]).is_ok());
        assert!(bus.write(1, 0x28, &[0x04]).is_ok());
        assert!(bus.write(1, 0x30, &[0x04]).is_err());
    }
}
