//! Touch sensor handle
//!
//! A [`TouchSensor`] is the in-process representative of one physical device:
//! its identity (bus, address, type), the mode it was last set to, its poll
//! policy, and the values from its most recent successful read. It owns no
//! threads and no bus; every operation borrows the [`Bus`] it talks through.
//!
//! # Read Paths
//!
//! | Mode | Topology | Registers read | Stored as |
//! |------|----------|----------------|-----------|
//! | centroid | 1-D | native 1-D centroid block | `TouchFrame::Linear` |
//! | centroid | 2-D | native 2-D centroid block | `TouchFrame::Planar` |
//! | centroid | raw array | diff channels | channels + extracted `TouchFrame::Linear` |
//! | raw / baseline / diff | any | channel block | channels |
//!
//! Touch locations and sizes in a frame are normalised to 0..1 regardless of
//! the path that produced them. Extracted touches put the first electrode at
//! 0 and the last at 1; their size is the segment intensity relative to one
//! full-scale channel, capped at 1.
//!
//! Channel counts are kept as read. Their range follows the scan resolution
//! last set with [`TouchSensor::set_scan_settings`] (12 bits by default).
//!
//! A failed read leaves the previous values in place and marks the handle
//! stale until the next successful read.

use crate::centroid;
use crate::core::bus::Bus;
use crate::core::types::{self, CompoundTouch, DeviceType, Mode, PollPolicy, Topology, Touch};
use crate::devices::trill::protocol::{
    self, CENTROID_1D_LEN, CENTROID_2D_LEN, IDENTIFY_LEN, Identity, OFFSET_DATA, TrillCommand,
};
use crate::error::{Error, Result};
use std::thread;

/// Scan interval written at open so the device keeps scanning between reads
const AUTO_SCAN_INTERVAL: u16 = 1;

/// Valid scan speed settings (0 = fastest)
const MAX_SCAN_SPEED: u8 = 3;
/// Valid scan resolutions in bits
const SCAN_BITS: std::ops::RangeInclusive<u8> = 9..=16;
/// Valid prescaler settings
const PRESCALER: std::ops::RangeInclusive<u8> = 1..=8;

/// Most recent touch data
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TouchFrame {
    /// Nothing read yet, or last read was not in centroid mode
    #[default]
    Empty,
    /// Touches along one axis
    Linear(Vec<Touch>),
    /// Touches along both axes of a 2-D sensor
    Planar {
        vertical: Vec<Touch>,
        horizontal: Vec<Touch>,
    },
}

/// Identify the device at `address`, if any.
///
/// Any bus error is treated as "nothing here": probing walks addresses that
/// are expected to be empty.
pub fn probe(bus: &mut dyn Bus, bus_id: u8, address: u8) -> Option<Identity> {
    let result = (|| -> Result<Option<Identity>> {
        bus.write(bus_id, address, &TrillCommand::Identify.encode())?;
        settle(bus);
        bus.write(bus_id, address, &[OFFSET_DATA])?;
        let mut answer = [0u8; IDENTIFY_LEN];
        bus.read(bus_id, address, &mut answer)?;
        Ok(protocol::decode_identity(&answer))
    })();

    match result {
        Ok(identity) => identity,
        Err(e) => {
            log::trace!("No answer on bus {} at {:#04x}: {}", bus_id, address, e);
            None
        }
    }
}

fn settle(bus: &dyn Bus) {
    let delay = bus.command_delay();
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// In-process handle for one touch sensor
#[derive(Debug, Clone)]
pub struct TouchSensor {
    id: String,
    bus: u8,
    address: u8,
    device_type: DeviceType,
    topology: Topology,
    firmware_version: u8,
    mode: Mode,
    num_bits: u8,
    raw: Vec<u16>,
    frame: TouchFrame,
    poll: PollPolicy,
    stale: bool,
}

impl TouchSensor {
    /// Open the device at `address` on `bus_id`.
    ///
    /// `requested` may be [`DeviceType::Unknown`] to accept whatever answers;
    /// otherwise the identified type must match. The device is put in
    /// centroid mode with continuous scanning.
    pub fn open(
        bus: &mut dyn Bus,
        id: &str,
        bus_id: u8,
        requested: DeviceType,
        address: u8,
        poll: PollPolicy,
    ) -> Result<Self> {
        let identity = probe(bus, bus_id, address).ok_or(Error::OpenFailed {
            bus: bus_id,
            address,
        })?;

        if requested != DeviceType::Unknown && requested != identity.device_type {
            return Err(Error::Config(format!(
                "Requested {} but found {} on bus {} at {:#04x}",
                requested, identity.device_type, bus_id, address
            )));
        }

        let mut sensor = Self {
            id: id.to_string(),
            bus: bus_id,
            address,
            device_type: identity.device_type,
            topology: identity.device_type.topology(),
            firmware_version: identity.firmware_version,
            mode: Mode::Centroid,
            num_bits: types::DEFAULT_NUM_BITS,
            raw: Vec::with_capacity(identity.device_type.num_channels()),
            frame: TouchFrame::Empty,
            poll,
            stale: true,
        };

        sensor.set_mode(bus, Mode::Centroid)?;
        sensor.send(bus, TrillCommand::AutoScanInterval(AUTO_SCAN_INTERVAL))?;

        log::info!(
            "Opened {} '{}' on bus {} at {:#04x} (firmware v{}, {} channels)",
            sensor.device_type,
            sensor.id,
            bus_id,
            address,
            sensor.firmware_version,
            sensor.num_channels()
        );
        Ok(sensor)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn firmware_version(&self) -> u8 {
        self.firmware_version
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn num_channels(&self) -> usize {
        self.device_type.num_channels()
    }

    /// Channel counts from the last channel read
    pub fn raw(&self) -> &[u16] {
        &self.raw
    }

    /// Scan resolution in bits
    pub fn num_bits(&self) -> u8 {
        self.num_bits
    }

    /// Count that a channel reading of 1.0 corresponds to
    pub fn full_scale(&self) -> f32 {
        types::full_scale(self.num_bits)
    }

    pub fn frame(&self) -> &TouchFrame {
        &self.frame
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }

    /// True until the first successful read and after any failed read
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Switch scanning mode
    pub fn set_mode(&mut self, bus: &mut dyn Bus, mode: Mode) -> Result<()> {
        let firmware = protocol::firmware_mode(self.device_type, mode);
        self.send(bus, TrillCommand::Mode(firmware.code()))?;
        if self.mode != mode {
            log::debug!("'{}': mode {} -> {}", self.id, self.mode, mode);
            self.frame = TouchFrame::Empty;
            self.raw.clear();
        }
        self.mode = mode;
        Ok(())
    }

    /// Set scan speed (0-3, 0 fastest) and resolution (9-16 bits)
    pub fn set_scan_settings(&mut self, bus: &mut dyn Bus, speed: u8, num_bits: u8) -> Result<()> {
        if speed > MAX_SCAN_SPEED || !SCAN_BITS.contains(&num_bits) {
            return Err(Error::Config(format!(
                "Invalid scan settings: speed {} (0-{}), bits {} ({}-{})",
                speed,
                MAX_SCAN_SPEED,
                num_bits,
                SCAN_BITS.start(),
                SCAN_BITS.end()
            )));
        }
        self.send(bus, TrillCommand::ScanSettings { speed, num_bits })?;
        self.num_bits = num_bits;
        Ok(())
    }

    /// Set the capacitance prescaler (1-8)
    pub fn set_prescaler(&mut self, bus: &mut dyn Bus, prescaler: u8) -> Result<()> {
        if !PRESCALER.contains(&prescaler) {
            return Err(Error::Config(format!(
                "Invalid prescaler {} ({}-{})",
                prescaler,
                PRESCALER.start(),
                PRESCALER.end()
            )));
        }
        self.send(bus, TrillCommand::Prescaler(prescaler))
    }

    /// Set the noise threshold below which channel readings are zeroed
    pub fn set_noise_threshold(&mut self, bus: &mut dyn Bus, threshold: u8) -> Result<()> {
        self.send(bus, TrillCommand::NoiseThreshold(threshold))
    }

    /// Capture the current channel readings as the new baseline
    pub fn update_baseline(&mut self, bus: &mut dyn Bus) -> Result<()> {
        self.send(bus, TrillCommand::BaselineUpdate)
    }

    /// Refresh values from the device
    pub fn read(&mut self, bus: &mut dyn Bus) -> Result<()> {
        let result = self.read_inner(bus);
        self.stale = result.is_err();
        result
    }

    fn read_inner(&mut self, bus: &mut dyn Bus) -> Result<()> {
        match (self.mode, self.topology) {
            (Mode::Centroid, Topology::OneD) => {
                let block = self.read_block(bus, CENTROID_1D_LEN)?;
                let touches = protocol::decode_centroids_1d(&block, self.device_type)?;
                self.frame = TouchFrame::Linear(touches);
            }
            (Mode::Centroid, Topology::TwoD) => {
                let block = self.read_block(bus, CENTROID_2D_LEN)?;
                let (vertical, horizontal) =
                    protocol::decode_centroids_2d(&block, self.device_type)?;
                self.frame = TouchFrame::Planar {
                    vertical,
                    horizontal,
                };
            }
            (Mode::Centroid, Topology::RawArray) => {
                self.read_channels(bus)?;
                self.frame = TouchFrame::Linear(self.extract_touches());
            }
            (Mode::Raw | Mode::Baseline | Mode::Diff, _) => {
                self.read_channels(bus)?;
            }
        }
        Ok(())
    }

    /// Host-side touches from the current diff profile.
    ///
    /// The extractor thresholds are in 12-bit counts, so other resolutions
    /// are rescaled first.
    fn extract_touches(&self) -> Vec<Touch> {
        let reference = types::full_scale(types::DEFAULT_NUM_BITS);
        let to_reference = reference / self.full_scale();
        let samples: Vec<u16> = self
            .raw
            .iter()
            .map(|&v| (v as f32 * to_reference).round().min(u16::MAX as f32) as u16)
            .collect();

        let last = self.num_channels().saturating_sub(1).max(1) as f32;
        centroid::extract(&samples)
            .into_iter()
            .map(|t| Touch {
                location: ((t.location - 1.0) / last).clamp(0.0, 1.0),
                size: (t.size / reference).min(1.0),
            })
            .collect()
    }

    fn read_channels(&mut self, bus: &mut dyn Bus) -> Result<()> {
        let channels = self.num_channels();
        let block = self.read_block(bus, protocol::channel_block_len(channels))?;
        self.raw = protocol::decode_channels(&block, channels)?;
        Ok(())
    }

    fn read_block(&self, bus: &mut dyn Bus, len: usize) -> Result<Vec<u8>> {
        bus.write(self.bus, self.address, &[OFFSET_DATA])?;
        let mut block = vec![0u8; len];
        bus.read(self.bus, self.address, &mut block)?;
        Ok(block)
    }

    fn send(&self, bus: &mut dyn Bus, cmd: TrillCommand) -> Result<()> {
        let packet = cmd.encode();
        log::trace!(
            "'{}': TX CMD=0x{:02X}, {} bytes: {:02X?}",
            self.id,
            cmd.cmd_id(),
            packet.len(),
            &packet
        );
        bus.write(self.bus, self.address, &packet)?;
        settle(bus);
        Ok(())
    }

    /// Touches along one axis; empty for 2-D frames
    pub fn touches(&self) -> &[Touch] {
        match &self.frame {
            TouchFrame::Linear(touches) => touches,
            _ => &[],
        }
    }

    /// Compound touch of the last 2-D frame
    pub fn compound_touch(&self) -> Option<CompoundTouch> {
        self.frame.compound_touch()
    }
}

impl TouchFrame {
    /// One touch summarising a 2-D frame: size-weighted position on each
    /// axis, size averaged over both axes. `None` when nothing is touched.
    pub fn compound_touch(&self) -> Option<CompoundTouch> {
        let TouchFrame::Planar {
            vertical,
            horizontal,
        } = self
        else {
            return None;
        };

        let (y, v_size) = weighted_location(vertical);
        let (x, h_size) = weighted_location(horizontal);
        let size = (v_size + h_size) * 0.5;
        if size > 0.0 {
            Some(CompoundTouch { x, y, size })
        } else {
            None
        }
    }
}

/// Size-weighted mean location and total size
fn weighted_location(touches: &[Touch]) -> (f32, f32) {
    let total: f32 = touches.iter().map(|t| t.size).sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    let weighted: f32 = touches.iter().map(|t| t.location * t.size).sum();
    (weighted / total, total)
}
