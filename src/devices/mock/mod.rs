//! Simulated sensor bus for hardware-free operation
//!
//! [`MockBus`] answers the Trill register protocol for a set of virtual
//! sensors keyed by `(bus, address)`. Addresses with no virtual sensor do not
//! acknowledge, so probing and `createAll` behave as on a real bus.
//!
//! # Simulation
//!
//! | Register access | Answer |
//! |-----------------|--------|
//! | identify, then data read | `[0xFE, type, firmware, 0]` |
//! | data read, centroid mode (1-D) | pressed touches in native 1-D slots |
//! | data read, centroid mode (2-D) | pressed touches on both axes |
//! | data read, diff mode | bump profile under each pressed touch |
//! | data read, baseline mode | flat baseline |
//! | data read, raw mode | baseline + bump profile |
//!
//! Touches are set with [`MockBus::press`] as `(location, size)` pairs in
//! 0..1. Channel readings get Gaussian noise when `noise_stddev > 0`.
//!
//! # Sharing
//!
//! `MockBus` is a cheap handle over shared state: clone it, hand one clone to
//! the controller as its bus, and keep the other to press touches and inspect
//! the command log from a test.
//!
//! # Module Structure
//!
//! - [`config`]: `[bus.mock]` configuration
//! - [`noise`]: seeded noise generator

pub mod config;
mod noise;

use crate::core::bus::Bus;
use crate::core::types::{self, DeviceType, Mode, Topology};
use crate::devices::trill::protocol::{
    self, Identity, MAX_TOUCHES_1D, MAX_TOUCHES_2D, OFFSET_COMMAND, OFFSET_DATA, TrillCommand,
};
use crate::error::{Error, Result};
use config::MockBusConfig;
use noise::NoiseGenerator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Flat channel level reported in baseline mode, at 12 bits
const BASELINE_COUNTS: u16 = 1800;
/// Peak diff counts of a full-size touch, at 12 bits
const PEAK_COUNTS: f32 = 3000.0;

/// One simulated sensor
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    device_type: DeviceType,
    firmware_version: u8,
    mode: Mode,
    num_bits: u8,
    identify_pending: bool,
    touches: Vec<(f32, f32)>,
    offline: bool,
    commands: Vec<TrillCommand>,
}

impl VirtualSensor {
    pub fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            firmware_version: 3,
            mode: Mode::Centroid,
            num_bits: types::DEFAULT_NUM_BITS,
            identify_pending: false,
            touches: Vec::new(),
            offline: false,
            commands: Vec::new(),
        }
    }

    pub fn with_firmware(mut self, version: u8) -> Self {
        self.firmware_version = version;
        self
    }

    fn apply(&mut self, cmd: TrillCommand) -> Result<()> {
        match cmd {
            TrillCommand::Mode(code) => {
                self.mode = Mode::from_code(code)
                    .ok_or_else(|| Error::Protocol(format!("Unknown mode code {}", code)))?;
            }
            TrillCommand::Identify => self.identify_pending = true,
            TrillCommand::ScanSettings { num_bits, .. } => self.num_bits = num_bits,
            _ => {}
        }
        self.commands.push(cmd);
        Ok(())
    }

    fn data_block(&mut self, noise: &mut NoiseGenerator, stddev: f32) -> Vec<u8> {
        if self.identify_pending {
            self.identify_pending = false;
            return protocol::encode_identity(Identity {
                device_type: self.device_type,
                firmware_version: self.firmware_version,
            })
            .to_vec();
        }

        match (self.mode, self.device_type.topology()) {
            (Mode::Centroid, Topology::OneD) => {
                let rescale = self.device_type.rescale();
                let slots = self.slots(rescale.position, rescale.size);
                protocol::encode_touch_slots(&slots, MAX_TOUCHES_1D)
            }
            (Mode::Centroid, Topology::TwoD) => {
                let rescale = self.device_type.rescale();
                let mut block = protocol::encode_touch_slots(
                    &self.slots(rescale.position, rescale.size),
                    MAX_TOUCHES_2D,
                );
                block.extend(protocol::encode_touch_slots(
                    &self.slots(rescale.position_h, rescale.size),
                    MAX_TOUCHES_2D,
                ));
                block
            }
            (mode, _) => {
                let max = self.max_count();
                let channels: Vec<u16> = self
                    .channels(mode)
                    .into_iter()
                    .map(|v| noise.perturb_count(v, stddev, max))
                    .collect();
                channels.iter().flat_map(|v| v.to_be_bytes()).collect()
            }
        }
    }

    /// Pressed touches as native register values
    fn slots(&self, position: f32, size: f32) -> Vec<(u16, u16)> {
        self.touches
            .iter()
            .map(|&(loc, sz)| {
                (
                    (loc.clamp(0.0, 1.0) * position).round() as u16,
                    (sz.clamp(0.0, 1.0) * size).round() as u16,
                )
            })
            .collect()
    }

    /// Largest count at the current scan resolution
    fn max_count(&self) -> u16 {
        (types::full_scale(self.num_bits) - 1.0) as u16
    }

    /// Channel counts for a non-centroid mode
    fn channels(&self, mode: Mode) -> Vec<u16> {
        let n = self.device_type.num_channels();
        let mut profile = vec![0f32; n];
        if n > 0 {
            for &(loc, size) in &self.touches {
                let centre = ((loc.clamp(0.0, 1.0) * n as f32).round() as usize)
                    .saturating_sub(1)
                    .min(n - 1);
                let height = size.clamp(0.0, 1.0) * PEAK_COUNTS;
                profile[centre] += height;
                if centre > 0 {
                    profile[centre - 1] += height * 0.5;
                }
                if centre + 1 < n {
                    profile[centre + 1] += height * 0.5;
                }
            }
        }

        let scale =
            types::full_scale(self.num_bits) / types::full_scale(types::DEFAULT_NUM_BITS);
        let max = self.max_count() as f32;
        let baseline = BASELINE_COUNTS as f32;
        profile
            .into_iter()
            .map(|diff| {
                let value = match mode {
                    Mode::Baseline => baseline,
                    Mode::Raw => baseline + diff,
                    Mode::Diff | Mode::Centroid => diff,
                };
                (value * scale).round().clamp(0.0, max) as u16
            })
            .collect()
    }
}

struct MockBusInner {
    sensors: HashMap<(u8, u8), VirtualSensor>,
    noise: NoiseGenerator,
    noise_stddev: f32,
    nack_rate: f32,
}

/// Simulated multi-bus register interface
#[derive(Clone)]
pub struct MockBus {
    inner: Arc<Mutex<MockBusInner>>,
}

impl MockBus {
    /// Empty bus: nothing acknowledges
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockBusInner {
                sensors: HashMap::new(),
                noise: NoiseGenerator::new(1),
                noise_stddev: 0.0,
                nack_rate: 0.0,
            })),
        }
    }

    pub fn from_config(config: &MockBusConfig) -> Self {
        let bus = Self::new();
        {
            let mut inner = bus.inner.lock();
            inner.noise = NoiseGenerator::new(config.random_seed);
            inner.noise_stddev = config.noise_stddev.max(0.0);
            inner.nack_rate = config.nack_rate.clamp(0.0, 1.0);
        }

        for device in &config.devices {
            let Some(address) = device.resolved_address() else {
                log::warn!(
                    "Mock device of type {} on bus {} has no address, skipping",
                    device.device_type,
                    device.bus
                );
                continue;
            };
            bus.attach(
                device.bus,
                address,
                VirtualSensor::new(device.device_type).with_firmware(device.firmware_version),
            );
        }
        bus
    }

    /// Place a virtual sensor at `address`, replacing any already there
    pub fn attach(&self, bus: u8, address: u8, sensor: VirtualSensor) {
        log::debug!(
            "Mock: {} on bus {} at {:#04x}",
            sensor.device_type,
            bus,
            address
        );
        self.inner.lock().sensors.insert((bus, address), sensor);
    }

    /// Remove the sensor at `address`
    pub fn detach(&self, bus: u8, address: u8) {
        self.inner.lock().sensors.remove(&(bus, address));
    }

    /// Set the touches currently on a sensor as `(location, size)` in 0..1
    pub fn press(&self, bus: u8, address: u8, touches: &[(f32, f32)]) {
        if let Some(sensor) = self.inner.lock().sensors.get_mut(&(bus, address)) {
            sensor.touches = touches.to_vec();
        }
    }

    pub fn release(&self, bus: u8, address: u8) {
        self.press(bus, address, &[]);
    }

    /// Stop (or resume) acknowledging transfers
    pub fn set_offline(&self, bus: u8, address: u8, offline: bool) {
        if let Some(sensor) = self.inner.lock().sensors.get_mut(&(bus, address)) {
            sensor.offline = offline;
        }
    }

    /// Commands received by a sensor, oldest first
    pub fn commands(&self, bus: u8, address: u8) -> Vec<TrillCommand> {
        self.inner
            .lock()
            .sensors
            .get(&(bus, address))
            .map(|s| s.commands.clone())
            .unwrap_or_default()
    }

    /// Firmware mode a sensor is currently scanning in
    pub fn mode(&self, bus: u8, address: u8) -> Option<Mode> {
        self.inner
            .lock()
            .sensors
            .get(&(bus, address))
            .map(|s| s.mode)
    }

    fn with_sensor<T>(
        &self,
        bus: u8,
        address: u8,
        f: impl FnOnce(&mut VirtualSensor, &mut NoiseGenerator, f32) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.lock();
        let MockBusInner {
            sensors,
            noise,
            noise_stddev,
            nack_rate,
        } = &mut *inner;

        let nack = || Error::Transport(format!("No ACK on bus {} at {:#04x}", bus, address));
        let sensor = sensors.get_mut(&(bus, address)).ok_or_else(nack)?;
        if sensor.offline || noise.chance(*nack_rate) {
            return Err(nack());
        }
        f(sensor, noise, *noise_stddev)
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for MockBus {
    fn write(&mut self, bus: u8, address: u8, bytes: &[u8]) -> Result<()> {
        self.with_sensor(bus, address, |sensor, _, _| match bytes.first() {
            Some(&OFFSET_DATA) => Ok(()),
            Some(&OFFSET_COMMAND) => sensor.apply(TrillCommand::decode(bytes)?),
            Some(other) => Err(Error::Protocol(format!(
                "Write to unmapped offset {:#04x}",
                other
            ))),
            None => Err(Error::Protocol("Empty write".to_string())),
        })
    }

    fn read(&mut self, bus: u8, address: u8, buf: &mut [u8]) -> Result<()> {
        self.with_sensor(bus, address, |sensor, noise, stddev| {
            let block = sensor.data_block(noise, stddev);
            let n = block.len().min(buf.len());
            buf[..n].copy_from_slice(&block[..n]);
            buf[n..].fill(0);
            Ok(())
        })
    }

    fn command_delay(&self) -> Duration {
        Duration::ZERO
    }
}
