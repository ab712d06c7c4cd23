//! Core data types shared by the sensor handle, registry and control protocol.
//!
//! - [`DeviceType`]: product name table (`bar`, `square`, ...) with firmware codes
//! - [`Topology`]: how touches are reported (1-D, 2-D, or host-side extraction)
//! - [`Mode`]: firmware scanning mode, also selects the outbound reading format
//! - [`PollPolicy`]: whether the poll loop reads a device
//! - [`Touch`]: one touch position/size pair

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel resolution a device scans at until told otherwise
pub const DEFAULT_NUM_BITS: u8 = 12;

/// Full scale of a channel reading at `num_bits` resolution
pub fn full_scale(num_bits: u8) -> f32 {
    (1u32 << u32::from(num_bits.min(16))) as f32
}

/// Sensor product, as reported by the identify command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Accept whatever answers at the address
    #[default]
    Unknown,
    Bar,
    Square,
    Craft,
    Ring,
    Hex,
    Flex,
}

impl DeviceType {
    /// Every concrete (non-`Unknown`) type
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Bar,
        DeviceType::Square,
        DeviceType::Craft,
        DeviceType::Ring,
        DeviceType::Hex,
        DeviceType::Flex,
    ];

    /// Resolve a name from the control protocol. Unresolved names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .unwrap_or(DeviceType::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Unknown => "unknown",
            DeviceType::Bar => "bar",
            DeviceType::Square => "square",
            DeviceType::Craft => "craft",
            DeviceType::Ring => "ring",
            DeviceType::Hex => "hex",
            DeviceType::Flex => "flex",
        }
    }

    /// Type code in the identify response
    pub fn code(self) -> u8 {
        match self {
            DeviceType::Unknown => 0,
            DeviceType::Bar => 1,
            DeviceType::Square => 2,
            DeviceType::Craft => 3,
            DeviceType::Ring => 4,
            DeviceType::Hex => 5,
            DeviceType::Flex => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DeviceType::Unknown),
            1 => Some(DeviceType::Bar),
            2 => Some(DeviceType::Square),
            3 => Some(DeviceType::Craft),
            4 => Some(DeviceType::Ring),
            5 => Some(DeviceType::Hex),
            6 => Some(DeviceType::Flex),
            _ => None,
        }
    }

    /// Factory address set by the solder bridges. `None` for `Unknown`.
    pub fn default_address(self) -> Option<u8> {
        match self {
            DeviceType::Unknown => None,
            DeviceType::Bar => Some(0x20),
            DeviceType::Square => Some(0x28),
            DeviceType::Craft => Some(0x30),
            DeviceType::Ring => Some(0x38),
            DeviceType::Hex => Some(0x40),
            DeviceType::Flex => Some(0x48),
        }
    }

    /// Number of electrodes
    pub fn num_channels(self) -> usize {
        match self {
            DeviceType::Unknown => 0,
            DeviceType::Bar => 26,
            DeviceType::Ring => 28,
            DeviceType::Square | DeviceType::Craft | DeviceType::Hex | DeviceType::Flex => 30,
        }
    }

    /// Touch reporting topology
    pub fn topology(self) -> Topology {
        match self {
            DeviceType::Bar | DeviceType::Ring => Topology::OneD,
            DeviceType::Square | DeviceType::Hex => Topology::TwoD,
            DeviceType::Craft | DeviceType::Flex | DeviceType::Unknown => Topology::RawArray,
        }
    }

    /// Divisors mapping native centroid registers to 0..1
    pub fn rescale(self) -> Rescale {
        let (position, position_h, size) = match self {
            DeviceType::Unknown => (1.0, 1.0, 1.0),
            DeviceType::Bar => (3200.0, 1.0, 4566.0),
            DeviceType::Square => (1792.0, 1792.0, 3780.0),
            DeviceType::Craft => (4096.0, 1.0, 1.0),
            DeviceType::Ring => (3584.0, 1.0, 5000.0),
            DeviceType::Hex => (1920.0, 1664.0, 4000.0),
            DeviceType::Flex => (3712.0, 1.0, 1200.0),
        };
        Rescale {
            position,
            position_h,
            size,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Centroid register scaling for one device type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub position: f32,
    pub position_h: f32,
    pub size: f32,
}

/// How a device reports touches in centroid mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Native 1-D centroid registers (location + size pairs)
    OneD,
    /// Native 2-D centroid registers, reported as one compound X/Y/size touch
    TwoD,
    /// No native centroids: touches are extracted from the diff profile
    RawArray,
}

/// Firmware scanning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Centroid,
    Raw,
    Baseline,
    Diff,
}

impl Mode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "centroid" => Some(Mode::Centroid),
            "raw" => Some(Mode::Raw),
            "baseline" => Some(Mode::Baseline),
            "diff" => Some(Mode::Diff),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Centroid => "centroid",
            Mode::Raw => "raw",
            Mode::Baseline => "baseline",
            Mode::Diff => "diff",
        }
    }

    /// Mode code written with the mode command
    pub fn code(self) -> u8 {
        match self {
            Mode::Centroid => 0,
            Mode::Raw => 1,
            Mode::Baseline => 2,
            Mode::Diff => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Mode::Centroid),
            1 => Some(Mode::Raw),
            2 => Some(Mode::Baseline),
            3 => Some(Mode::Diff),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the poll loop reads a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPolicy {
    #[default]
    Never,
    /// Read on the next cycle, then fall back to `Never`
    Once,
    Always,
}

impl PollPolicy {
    /// `Always` when enabled, `Never` otherwise
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            PollPolicy::Always
        } else {
            PollPolicy::Never
        }
    }
}

/// One touch: position along an axis and contact size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Touch {
    pub location: f32,
    pub size: f32,
}

/// Single touch summarising a 2-D frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompoundTouch {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}
