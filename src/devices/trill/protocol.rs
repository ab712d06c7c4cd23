//! Trill register protocol
//!
//! # Register Layout
//!
//! ```text
//! Offset 0x00: command block   [0x00, cmd, arg...]   (write only)
//! Offset 0x04: data block      [0x04] then read N    (read only)
//! ```
//!
//! Commands are written starting at offset 0. To read data, the register
//! pointer is moved to the data offset with a one-byte write, then a block is
//! read. After an identify command the data block holds the identify answer
//! instead of scan data.
//!
//! # Command Table
//!
//! | Command | Code | Arguments |
//! |---------|------|-----------|
//! | Mode | 0x01 | mode |
//! | ScanSettings | 0x02 | speed (0-3), num_bits (9-16) |
//! | Prescaler | 0x03 | prescaler (1-8) |
//! | NoiseThreshold | 0x04 | threshold (0-255) |
//! | BaselineUpdate | 0x06 | - |
//! | AutoScanInterval | 0x10 | interval (u16 BE) |
//! | Identify | 0xFF | - |
//!
//! # Data Blocks
//!
//! All values are big-endian `u16`.
//!
//! | Block | Layout |
//! |-------|--------|
//! | Identify | `0xFE`, type code, firmware version |
//! | Raw / baseline / diff | one 12-bit value per channel |
//! | 1-D centroid | 5 locations, 5 sizes (location `0xFFFF` = no touch) |
//! | 2-D centroid | 4 vertical locations, 4 vertical sizes, 4 horizontal locations, 4 horizontal sizes |

use crate::core::types::{DeviceType, Mode, Touch};
use crate::error::{Error, Result};

/// Register offset of the command block
pub const OFFSET_COMMAND: u8 = 0x00;
/// Register offset of the data block
pub const OFFSET_DATA: u8 = 0x04;

/// First byte of a valid identify answer
pub const IDENTIFY_MARKER: u8 = 0xFE;
/// Length of the identify answer block
pub const IDENTIFY_LEN: usize = 4;

/// Touch slots in a native 1-D centroid block
pub const MAX_TOUCHES_1D: usize = 5;
/// Touch slots per axis in a native 2-D centroid block
pub const MAX_TOUCHES_2D: usize = 4;

/// Location value of an empty touch slot
const NO_TOUCH: u16 = 0xFFFF;

/// Command written to the command block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrillCommand {
    Mode(u8),
    ScanSettings { speed: u8, num_bits: u8 },
    Prescaler(u8),
    NoiseThreshold(u8),
    BaselineUpdate,
    AutoScanInterval(u16),
    Identify,
}

impl TrillCommand {
    pub fn cmd_id(&self) -> u8 {
        match self {
            TrillCommand::Mode(_) => 0x01,
            TrillCommand::ScanSettings { .. } => 0x02,
            TrillCommand::Prescaler(_) => 0x03,
            TrillCommand::NoiseThreshold(_) => 0x04,
            TrillCommand::BaselineUpdate => 0x06,
            TrillCommand::AutoScanInterval(_) => 0x10,
            TrillCommand::Identify => 0xFF,
        }
    }

    /// Encode as a write to the command block
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = vec![OFFSET_COMMAND, self.cmd_id()];
        match *self {
            TrillCommand::Mode(mode) => packet.push(mode),
            TrillCommand::ScanSettings { speed, num_bits } => {
                packet.push(speed);
                packet.push(num_bits);
            }
            TrillCommand::Prescaler(value) => packet.push(value),
            TrillCommand::NoiseThreshold(value) => packet.push(value),
            TrillCommand::AutoScanInterval(interval) => {
                packet.extend_from_slice(&interval.to_be_bytes())
            }
            TrillCommand::BaselineUpdate | TrillCommand::Identify => {}
        }
        packet
    }

    /// Decode a command block write (inverse of [`TrillCommand::encode`])
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let [offset, cmd, args @ ..] = packet else {
            return Err(Error::Protocol(format!(
                "Command block too short: {} bytes",
                packet.len()
            )));
        };
        if *offset != OFFSET_COMMAND {
            return Err(Error::Protocol(format!(
                "Command written at offset {:#04x}",
                offset
            )));
        }
        let arg = |n: usize| {
            args.get(n).copied().ok_or_else(|| {
                Error::Protocol(format!("Command {:#04x} missing argument {}", cmd, n))
            })
        };
        Ok(match *cmd {
            0x01 => TrillCommand::Mode(arg(0)?),
            0x02 => TrillCommand::ScanSettings {
                speed: arg(0)?,
                num_bits: arg(1)?,
            },
            0x03 => TrillCommand::Prescaler(arg(0)?),
            0x04 => TrillCommand::NoiseThreshold(arg(0)?),
            0x06 => TrillCommand::BaselineUpdate,
            0x10 => TrillCommand::AutoScanInterval(u16::from_be_bytes([arg(0)?, arg(1)?])),
            0xFF => TrillCommand::Identify,
            other => {
                return Err(Error::Protocol(format!("Unknown command {:#04x}", other)));
            }
        })
    }
}

/// Parsed identify answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub device_type: DeviceType,
    pub firmware_version: u8,
}

/// Decode an identify answer. `None` means the device is not a Trill.
pub fn decode_identity(block: &[u8]) -> Option<Identity> {
    match block {
        [IDENTIFY_MARKER, code, version, ..] => {
            let device_type = DeviceType::from_code(*code)?;
            if device_type == DeviceType::Unknown {
                return None;
            }
            Some(Identity {
                device_type,
                firmware_version: *version,
            })
        }
        _ => None,
    }
}

/// Encode an identify answer
pub fn encode_identity(identity: Identity) -> [u8; IDENTIFY_LEN] {
    [
        IDENTIFY_MARKER,
        identity.device_type.code(),
        identity.firmware_version,
        0,
    ]
}

/// Firmware mode actually written for a requested mode.
///
/// Devices without native centroids keep scanning differential data while
/// the host extracts touches.
pub fn firmware_mode(device_type: DeviceType, mode: Mode) -> Mode {
    use crate::core::types::Topology;
    match (mode, device_type.topology()) {
        (Mode::Centroid, Topology::RawArray) => Mode::Diff,
        (mode, _) => mode,
    }
}

/// Bytes needed for a channel block
pub fn channel_block_len(num_channels: usize) -> usize {
    num_channels * 2
}

/// Bytes needed for a 1-D centroid block
pub const CENTROID_1D_LEN: usize = MAX_TOUCHES_1D * 2 * 2;
/// Bytes needed for a 2-D centroid block
pub const CENTROID_2D_LEN: usize = MAX_TOUCHES_2D * 4 * 2;

fn words(block: &[u8]) -> impl Iterator<Item = u16> + '_ {
    block
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
}

/// Decode a raw/baseline/diff block into channel counts.
///
/// Counts are returned as read; their range depends on the scan resolution.
pub fn decode_channels(block: &[u8], num_channels: usize) -> Result<Vec<u16>> {
    let needed = channel_block_len(num_channels);
    if block.len() < needed {
        return Err(Error::Protocol(format!(
            "Channel block too short: {} < {} bytes",
            block.len(),
            needed
        )));
    }
    Ok(words(&block[..needed]).collect())
}

/// Decode `slots` location/size pairs, dropping empty slots.
fn decode_touch_slots(block: &[u8], slots: usize, position: f32, size: f32) -> Vec<Touch> {
    let values: Vec<u16> = words(block).take(slots * 2).collect();
    let (locations, sizes) = values.split_at(slots.min(values.len()));
    locations
        .iter()
        .zip(sizes)
        .take_while(|(loc, _)| **loc != NO_TOUCH)
        .map(|(&loc, &sz)| Touch {
            location: loc as f32 / position,
            size: sz as f32 / size,
        })
        .collect()
}

/// Decode a native 1-D centroid block, normalised by the device's rescale factors
pub fn decode_centroids_1d(block: &[u8], device_type: DeviceType) -> Result<Vec<Touch>> {
    if block.len() < CENTROID_1D_LEN {
        return Err(Error::Protocol(format!(
            "1-D centroid block too short: {} < {} bytes",
            block.len(),
            CENTROID_1D_LEN
        )));
    }
    let rescale = device_type.rescale();
    Ok(decode_touch_slots(
        &block[..CENTROID_1D_LEN],
        MAX_TOUCHES_1D,
        rescale.position,
        rescale.size,
    ))
}

/// Decode a native 2-D centroid block into (vertical, horizontal) touches
pub fn decode_centroids_2d(
    block: &[u8],
    device_type: DeviceType,
) -> Result<(Vec<Touch>, Vec<Touch>)> {
    if block.len() < CENTROID_2D_LEN {
        return Err(Error::Protocol(format!(
            "2-D centroid block too short: {} < {} bytes",
            block.len(),
            CENTROID_2D_LEN
        )));
    }
    let rescale = device_type.rescale();
    let half = CENTROID_2D_LEN / 2;
    let vertical = decode_touch_slots(
        &block[..half],
        MAX_TOUCHES_2D,
        rescale.position,
        rescale.size,
    );
    let horizontal = decode_touch_slots(
        &block[half..CENTROID_2D_LEN],
        MAX_TOUCHES_2D,
        rescale.position_h,
        rescale.size,
    );
    Ok((vertical, horizontal))
}

/// Encode touch slots as register words (used by the simulated bus)
pub fn encode_touch_slots(touches: &[(u16, u16)], slots: usize) -> Vec<u8> {
    let mut block = Vec::with_capacity(slots * 4);
    for n in 0..slots {
        let loc = touches.get(n).map_or(NO_TOUCH, |t| t.0);
        block.extend_from_slice(&loc.to_be_bytes());
    }
    for n in 0..slots {
        let size = touches.get(n).map_or(0, |t| t.1);
        block.extend_from_slice(&size.to_be_bytes());
    }
    block
}
