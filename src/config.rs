//! Configuration for the trill-osc daemon
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! or missing file yields a working configuration. Command line flags are
//! applied on top by the binary.
//!
//! ```toml
//! [osc]
//! root = "/trill"
//! listen_address = "0.0.0.0:7562"
//! remote_address = "127.0.0.1:7563"
//! rebind_on_first_packet = false
//!
//! [polling]
//! loop_sleep_ms = 20
//! sleep_slice_ms = 10
//! receive_timeout_ms = 1
//! auto_read_all = false
//! scan_buses = [1]
//!
//! [bus]
//! type = "i2c"                 # or "mock"
//! device_path = "/dev/i2c-{bus}"
//!
//! [logging]
//! level = "info"
//! ```

use crate::devices::mock::config::MockBusConfig;
use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Config path used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "/etc/trill-osc.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OSC endpoints and address namespace
#[derive(Debug, Clone, Deserialize)]
pub struct OscConfig {
    /// Address prefix of every inbound and outbound message
    #[serde(default = "default_root")]
    pub root: String,

    /// Local UDP endpoint for commands
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Where readings and replies are sent
    #[serde(default = "default_remote_address")]
    pub remote_address: String,

    /// Send to the origin of the first inbound packet instead of
    /// `remote_address` (first packet only)
    #[serde(default)]
    pub rebind_on_first_packet: bool,
}

fn default_root() -> String {
    "/trill".to_string()
}
fn default_listen_address() -> String {
    "0.0.0.0:7562".to_string()
}
fn default_remote_address() -> String {
    "127.0.0.1:7563".to_string()
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            listen_address: default_listen_address(),
            remote_address: default_remote_address(),
            rebind_on_first_packet: false,
        }
    }
}

impl OscConfig {
    /// Replace the port of `listen_address`
    pub fn set_listen_port(&mut self, port: u16) {
        let host = self
            .listen_address
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host);
        self.listen_address = format!("{}:{}", host, port);
    }
}

/// Poll loop timing
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Sleep between poll cycles
    #[serde(default = "default_loop_sleep_ms")]
    pub loop_sleep_ms: u64,

    /// The sleep is cut into slices so a stop request is seen promptly
    #[serde(default = "default_sleep_slice_ms")]
    pub sleep_slice_ms: u64,

    /// Wait for each inbound datagram check
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// Poll newly created devices every cycle
    #[serde(default)]
    pub auto_read_all: bool,

    /// Buses scanned for devices at startup
    #[serde(default)]
    pub scan_buses: Vec<u8>,
}

fn default_loop_sleep_ms() -> u64 {
    20
}
fn default_sleep_slice_ms() -> u64 {
    10
}
fn default_receive_timeout_ms() -> u64 {
    1
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            loop_sleep_ms: default_loop_sleep_ms(),
            sleep_slice_ms: default_sleep_slice_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            auto_read_all: false,
            scan_buses: Vec::new(),
        }
    }
}

impl PollingConfig {
    pub fn loop_sleep(&self) -> Duration {
        Duration::from_millis(self.loop_sleep_ms)
    }

    /// Never zero
    pub fn sleep_slice(&self) -> Duration {
        Duration::from_millis(self.sleep_slice_ms.max(1))
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Bus backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Linux I2C character devices
    #[default]
    I2c,
    /// Simulated sensors
    Mock,
}

/// Sensor bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(rename = "type", default)]
    pub bus_type: BusType,

    /// Device path template, `{bus}` is replaced by the bus number
    #[serde(default = "default_device_path")]
    pub device_path: String,

    #[serde(default)]
    pub mock: MockBusConfig,
}

fn default_device_path() -> String {
    "/dev/i2c-{bus}".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_type: BusType::default(),
            device_path: default_device_path(),
            mock: MockBusConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise built-in defaults.
    ///
    /// Runs before logging is set up, so the caller reports the source.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::from_file(path)?, ConfigSource::File))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }
}

/// Where [`Config::load`] took its values from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No file at the given path
    Defaults,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.osc.root, "/trill");
        assert_eq!(config.osc.listen_address, "0.0.0.0:7562");
        assert_eq!(config.osc.remote_address, "127.0.0.1:7563");
        assert!(!config.osc.rebind_on_first_packet);
        assert_eq!(config.polling.loop_sleep(), Duration::from_millis(20));
        assert_eq!(config.polling.sleep_slice(), Duration::from_millis(10));
        assert_eq!(config.polling.receive_timeout(), Duration::from_millis(1));
        assert_eq!(config.bus.bus_type, BusType::I2c);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.osc.root, "/trill");
        assert_eq!(config.bus.device_path, "/dev/i2c-{bus}");
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[osc]
root = "/touch"
remote_address = "192.168.1.10:9000"
rebind_on_first_packet = true

[polling]
loop_sleep_ms = 5
auto_read_all = true
scan_buses = [1, 3]

[bus]
type = "mock"

[bus.mock]
noise_stddev = 4.0

[[bus.mock.devices]]
type = "ring"

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.osc.root, "/touch");
        assert_eq!(config.osc.listen_address, "0.0.0.0:7562");
        assert!(config.osc.rebind_on_first_packet);
        assert_eq!(config.polling.loop_sleep_ms, 5);
        assert_eq!(config.polling.sleep_slice_ms, 10);
        assert_eq!(config.polling.scan_buses, vec![1, 3]);
        assert_eq!(config.bus.bus_type, BusType::Mock);
        assert_eq!(config.bus.mock.devices.len(), 1);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\nreceive_timeout_ms = 3").unwrap();

        let (config, source) = Config::load(file.path()).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.polling.receive_timeout_ms, 3);
    }

    #[test]
    fn test_load_missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.polling.loop_sleep_ms, 20);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bus]\ntype = \"spi\"").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_set_listen_port() {
        let mut osc = OscConfig::default();
        osc.set_listen_port(9000);
        assert_eq!(osc.listen_address, "0.0.0.0:9000");
    }
}
