//! Command execution
//!
//! The [`Controller`] owns everything a command can touch: the device
//! registry, the bus, and the runtime settings (`autoReadAll` default and
//! loop sleep). It is driven from the single control thread; nothing here
//! is shared or locked.
//!
//! Errors from parsing or execution never escape [`Controller::handle_message`]:
//! they are logged and the message is dropped without a reply. Device
//! communication failures on setting verbs are not errors at this level;
//! they produce a status reply with code -1.

use super::{Command, Verb};
use crate::core::bus::Bus;
use crate::core::types::PollPolicy;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::sensor::TouchSensor;
use crate::streaming::{DeviceInfo, OscPaths, Reply};
use rosc::OscMessage;
use std::time::Duration;

/// Registry, bus and runtime settings
pub struct Controller {
    registry: Registry,
    bus: Box<dyn Bus>,
    auto_read_all: bool,
    loop_sleep: Duration,
}

impl Controller {
    pub fn new(bus: Box<dyn Bus>, auto_read_all: bool, loop_sleep: Duration) -> Self {
        Self {
            registry: Registry::new(),
            bus,
            auto_read_all,
            loop_sleep,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry and bus borrowed together, for the poll loop
    pub fn split_mut(&mut self) -> (&mut Registry, &mut dyn Bus) {
        (&mut self.registry, self.bus.as_mut())
    }

    pub fn auto_read_all(&self) -> bool {
        self.auto_read_all
    }

    pub fn loop_sleep(&self) -> Duration {
        self.loop_sleep
    }

    /// Policy given to newly created devices
    pub fn default_policy(&self) -> PollPolicy {
        PollPolicy::from_flag(self.auto_read_all)
    }

    /// Parse and execute one inbound message
    pub fn handle_message(&mut self, paths: &OscPaths, message: &OscMessage) -> Vec<Reply> {
        let result = Command::from_message(paths, message).and_then(|cmd| {
            log::debug!("Command: {:?}", cmd);
            self.execute(cmd)
        });
        match result {
            Ok(replies) => replies,
            Err(e) => {
                log::warn!("Dropped {} {:?}: {}", message.addr, message.args, e);
                Vec::new()
            }
        }
    }

    /// Execute a parsed command
    pub fn execute(&mut self, cmd: Command) -> Result<Vec<Reply>> {
        match cmd {
            Command::ListAll => Ok(self
                .registry
                .iter()
                .map(|s| info_reply(Verb::List, s))
                .collect()),
            Command::CreateAll { bus } => Ok(self.create_all(bus)),
            Command::DeleteAll => {
                self.registry.clear();
                Ok(Vec::new())
            }
            Command::AutoReadAll { enabled } => {
                self.auto_read_all = enabled;
                let policy = self.default_policy();
                for sensor in self.registry.iter_mut() {
                    sensor.set_poll_policy(policy);
                }
                log::info!("autoReadAll {}", if enabled { "on" } else { "off" });
                Ok(Vec::new())
            }
            Command::LoopSleep { ms } => {
                self.loop_sleep = Duration::from_micros((ms * 1000.0).round() as u64);
                log::info!("Loop sleep {:?}", self.loop_sleep);
                Ok(Vec::new())
            }
            Command::New {
                id,
                bus,
                device_type,
                address,
            } => {
                let address = address.or(device_type.default_address()).ok_or_else(|| {
                    Error::Config(format!("'{}': no address for type {}", id, device_type))
                })?;
                let policy = self.default_policy();
                let sensor =
                    self.registry
                        .create(self.bus.as_mut(), &id, bus, device_type, address, policy)?;
                Ok(vec![info_reply(Verb::New, sensor)])
            }
            cmd => self.execute_instance(cmd),
        }
    }

    /// Scan a bus and open every device found, one `new` reply each
    pub fn create_all(&mut self, bus: u8) -> Vec<Reply> {
        let policy = self.default_policy();
        let ids = self.registry.create_all(self.bus.as_mut(), bus, policy);
        ids.iter()
            .filter_map(|id| self.registry.get(id))
            .map(|s| info_reply(Verb::New, s))
            .collect()
    }

    /// Verbs that act on an existing device
    fn execute_instance(&mut self, cmd: Command) -> Result<Vec<Reply>> {
        let verb = cmd.verb();
        let id = cmd.id().unwrap_or_default().to_string();
        if !self.registry.contains(&id) {
            return Err(Error::NotFound(id));
        }
        if let Command::Delete { .. } = cmd {
            self.registry.delete(&id);
            return Ok(Vec::new());
        }

        let bus = self.bus.as_mut();
        let sensor = self
            .registry
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        let outcome = match cmd {
            Command::List { .. } => return Ok(vec![info_reply(Verb::List, sensor)]),
            Command::AutoRead { enabled, .. } => {
                sensor.set_poll_policy(PollPolicy::from_flag(enabled));
                return Ok(Vec::new());
            }
            Command::ReadI2c { .. } => {
                sensor.set_poll_policy(PollPolicy::Once);
                return Ok(Vec::new());
            }
            Command::UpdateBaseline { .. } => sensor.update_baseline(bus),
            Command::SetScanSettings {
                speed, num_bits, ..
            } => sensor.set_scan_settings(bus, speed, num_bits),
            Command::SetPrescaler { value, .. } => sensor.set_prescaler(bus, value),
            Command::SetNoiseThreshold { value, .. } => sensor.set_noise_threshold(bus, value),
            Command::SetMode { mode, .. } => sensor.set_mode(bus, mode),
            other => {
                return Err(Error::Protocol(format!(
                    "{} is not an instance command",
                    other.verb()
                )));
            }
        };

        if let Err(e) = &outcome {
            log::warn!("'{}': {} failed: {}", id, verb, e);
        }
        Ok(vec![Reply::Status {
            verb,
            id,
            ok: outcome.is_ok(),
        }])
    }
}

fn info_reply(verb: Verb, sensor: &TouchSensor) -> Reply {
    Reply::Info {
        verb,
        info: DeviceInfo::from(sensor),
    }
}
