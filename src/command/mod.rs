//! Control protocol: verbs, typed commands and argument checking
//!
//! Commands arrive as OSC messages at `<root>/command/<verb>`. Parsing turns
//! a message into a [`Command`] with every argument type-checked, before the
//! [`Controller`] touches any state.
//!
//! # Verbs
//!
//! | Verb | Arguments | Reply |
//! |------|-----------|-------|
//! | `listAll` | - | one `list` per device |
//! | `createAll` | f bus | one `new` per device created |
//! | `deleteAll` | - | - |
//! | `autoReadAll` | f enable | - |
//! | `loopSleep` | f ms | - |
//! | `new` | s id, f bus, s type, \[f address\] | `new` |
//! | `delete` | s id | - |
//! | `list` | s id | `list` |
//! | `autoRead` | s id, f enable | - |
//! | `readI2C` | s id | - |
//! | `updateBaseline` | s id | status |
//! | `setScanSettings` | s id, f speed, f bits | status |
//! | `setPrescaler` | s id, f value | status |
//! | `setNoiseThreshold` | s id, f value | status |
//! | `setMode` | s id, s mode | status |
//!
//! `f` arguments accept OSC int, float or double.

pub mod dispatch;

pub use dispatch::Controller;

use crate::core::types::{DeviceType, Mode};
use crate::error::{Error, Result};
use crate::streaming::OscPaths;
use crate::streaming::osc;
use rosc::{OscMessage, OscType};
use std::fmt;

/// Command verb (last address segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    ListAll,
    CreateAll,
    DeleteAll,
    AutoReadAll,
    LoopSleep,
    New,
    Delete,
    List,
    AutoRead,
    ReadI2c,
    UpdateBaseline,
    SetScanSettings,
    SetPrescaler,
    SetNoiseThreshold,
    SetMode,
}

impl Verb {
    pub const ALL: [Verb; 15] = [
        Verb::ListAll,
        Verb::CreateAll,
        Verb::DeleteAll,
        Verb::AutoReadAll,
        Verb::LoopSleep,
        Verb::New,
        Verb::Delete,
        Verb::List,
        Verb::AutoRead,
        Verb::ReadI2c,
        Verb::UpdateBaseline,
        Verb::SetScanSettings,
        Verb::SetPrescaler,
        Verb::SetNoiseThreshold,
        Verb::SetMode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Verb::ListAll => "listAll",
            Verb::CreateAll => "createAll",
            Verb::DeleteAll => "deleteAll",
            Verb::AutoReadAll => "autoReadAll",
            Verb::LoopSleep => "loopSleep",
            Verb::New => "new",
            Verb::Delete => "delete",
            Verb::List => "list",
            Verb::AutoRead => "autoRead",
            Verb::ReadI2c => "readI2C",
            Verb::UpdateBaseline => "updateBaseline",
            Verb::SetScanSettings => "setScanSettings",
            Verb::SetPrescaler => "setPrescaler",
            Verb::SetNoiseThreshold => "setNoiseThreshold",
            Verb::SetMode => "setMode",
        }
    }

    /// Exact (case-sensitive) verb lookup
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Verbs that do not address a single device
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Verb::ListAll | Verb::CreateAll | Verb::DeleteAll | Verb::AutoReadAll | Verb::LoopSleep
        )
    }

    /// Argument type tags after the id, for error messages
    fn signature(self) -> &'static str {
        match self {
            Verb::ListAll | Verb::DeleteAll => "",
            Verb::CreateAll | Verb::AutoReadAll | Verb::LoopSleep => "f",
            Verb::New => "s f s [f]",
            Verb::Delete | Verb::List | Verb::ReadI2c | Verb::UpdateBaseline => "s",
            Verb::AutoRead | Verb::SetPrescaler | Verb::SetNoiseThreshold => "s f",
            Verb::SetScanSettings => "s f f",
            Verb::SetMode => "s s",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed, type-checked control command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ListAll,
    CreateAll {
        bus: u8,
    },
    DeleteAll,
    AutoReadAll {
        enabled: bool,
    },
    LoopSleep {
        ms: f32,
    },
    New {
        id: String,
        bus: u8,
        device_type: DeviceType,
        /// `None`: the type's default address
        address: Option<u8>,
    },
    Delete {
        id: String,
    },
    List {
        id: String,
    },
    AutoRead {
        id: String,
        enabled: bool,
    },
    ReadI2c {
        id: String,
    },
    UpdateBaseline {
        id: String,
    },
    SetScanSettings {
        id: String,
        speed: u8,
        num_bits: u8,
    },
    SetPrescaler {
        id: String,
        value: u8,
    },
    SetNoiseThreshold {
        id: String,
        value: u8,
    },
    SetMode {
        id: String,
        mode: Mode,
    },
}

/// Highest 7-bit device address
const MAX_ADDRESS: u8 = 0x7F;

impl Command {
    /// Parse an inbound OSC message under `paths`
    pub fn from_message(paths: &OscPaths, message: &OscMessage) -> Result<Self> {
        let verb_name = paths.command_verb(&message.addr)?;
        let verb = Verb::from_name(verb_name)
            .ok_or_else(|| Error::Protocol(format!("Unknown command: {}", verb_name)))?;
        Self::parse(verb, &message.args)
    }

    /// Check `args` against the verb's signature
    pub fn parse(verb: Verb, args: &[OscType]) -> Result<Self> {
        let a = Args { verb, args };

        let command = match verb {
            Verb::ListAll => {
                a.arity(0)?;
                Command::ListAll
            }
            Verb::CreateAll => {
                a.arity(1)?;
                Command::CreateAll { bus: a.byte(0)? }
            }
            Verb::DeleteAll => {
                a.arity(0)?;
                Command::DeleteAll
            }
            Verb::AutoReadAll => {
                a.arity(1)?;
                Command::AutoReadAll {
                    enabled: a.flag(0)?,
                }
            }
            Verb::LoopSleep => {
                a.arity(1)?;
                let ms = a.number(0)?;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(a.mismatch());
                }
                Command::LoopSleep { ms }
            }
            Verb::New => {
                if !(3..=4).contains(&args.len()) {
                    return Err(a.mismatch());
                }
                let id = a.id()?;
                let bus = a.byte(1)?;
                let device_type = DeviceType::from_name(a.string(2)?);
                let address = if args.len() == 4 {
                    let address = a.byte(3)?;
                    if address > MAX_ADDRESS {
                        return Err(Error::Protocol(format!(
                            "Address {:#04x} is not a 7-bit address",
                            address
                        )));
                    }
                    Some(address)
                } else {
                    None
                };
                if device_type == DeviceType::Unknown && address.is_none() {
                    return Err(Error::Config(format!(
                        "'{}': device type '{}' needs an explicit address",
                        id,
                        a.string(2)?
                    )));
                }
                Command::New {
                    id,
                    bus,
                    device_type,
                    address,
                }
            }
            Verb::Delete => {
                a.arity(1)?;
                Command::Delete { id: a.id()? }
            }
            Verb::List => {
                a.arity(1)?;
                Command::List { id: a.id()? }
            }
            Verb::AutoRead => {
                a.arity(2)?;
                Command::AutoRead {
                    id: a.id()?,
                    enabled: a.flag(1)?,
                }
            }
            Verb::ReadI2c => {
                a.arity(1)?;
                Command::ReadI2c { id: a.id()? }
            }
            Verb::UpdateBaseline => {
                a.arity(1)?;
                Command::UpdateBaseline { id: a.id()? }
            }
            Verb::SetScanSettings => {
                a.arity(3)?;
                Command::SetScanSettings {
                    id: a.id()?,
                    speed: a.byte(1)?,
                    num_bits: a.byte(2)?,
                }
            }
            Verb::SetPrescaler => {
                a.arity(2)?;
                Command::SetPrescaler {
                    id: a.id()?,
                    value: a.clamped_byte(1)?,
                }
            }
            Verb::SetNoiseThreshold => {
                a.arity(2)?;
                Command::SetNoiseThreshold {
                    id: a.id()?,
                    value: a.clamped_byte(1)?,
                }
            }
            Verb::SetMode => {
                a.arity(2)?;
                let id = a.id()?;
                let name = a.string(1)?;
                let mode = Mode::from_name(name)
                    .ok_or_else(|| Error::Config(format!("'{}': unknown mode '{}'", id, name)))?;
                Command::SetMode { id, mode }
            }
        };
        Ok(command)
    }

    pub fn verb(&self) -> Verb {
        match self {
            Command::ListAll => Verb::ListAll,
            Command::CreateAll { .. } => Verb::CreateAll,
            Command::DeleteAll => Verb::DeleteAll,
            Command::AutoReadAll { .. } => Verb::AutoReadAll,
            Command::LoopSleep { .. } => Verb::LoopSleep,
            Command::New { .. } => Verb::New,
            Command::Delete { .. } => Verb::Delete,
            Command::List { .. } => Verb::List,
            Command::AutoRead { .. } => Verb::AutoRead,
            Command::ReadI2c { .. } => Verb::ReadI2c,
            Command::UpdateBaseline { .. } => Verb::UpdateBaseline,
            Command::SetScanSettings { .. } => Verb::SetScanSettings,
            Command::SetPrescaler { .. } => Verb::SetPrescaler,
            Command::SetNoiseThreshold { .. } => Verb::SetNoiseThreshold,
            Command::SetMode { .. } => Verb::SetMode,
        }
    }

    /// Device id of an instance command
    pub fn id(&self) -> Option<&str> {
        match self {
            Command::ListAll
            | Command::CreateAll { .. }
            | Command::DeleteAll
            | Command::AutoReadAll { .. }
            | Command::LoopSleep { .. } => None,
            Command::New { id, .. }
            | Command::Delete { id }
            | Command::List { id }
            | Command::AutoRead { id, .. }
            | Command::ReadI2c { id }
            | Command::UpdateBaseline { id }
            | Command::SetScanSettings { id, .. }
            | Command::SetPrescaler { id, .. }
            | Command::SetNoiseThreshold { id, .. }
            | Command::SetMode { id, .. } => Some(id),
        }
    }
}

/// Positional argument access with signature errors
struct Args<'a> {
    verb: Verb,
    args: &'a [OscType],
}

impl Args<'_> {
    fn mismatch(&self) -> Error {
        Error::Protocol(format!(
            "{} expects ({}), got {:?}",
            self.verb,
            self.verb.signature(),
            self.args
        ))
    }

    fn arity(&self, n: usize) -> Result<()> {
        if self.args.len() == n {
            Ok(())
        } else {
            Err(self.mismatch())
        }
    }

    fn string(&self, i: usize) -> Result<&str> {
        self.args
            .get(i)
            .and_then(osc::as_str)
            .ok_or_else(|| self.mismatch())
    }

    fn id(&self) -> Result<String> {
        self.string(0).map(str::to_string)
    }

    fn number(&self, i: usize) -> Result<f32> {
        self.args
            .get(i)
            .and_then(osc::as_number)
            .ok_or_else(|| self.mismatch())
    }

    fn flag(&self, i: usize) -> Result<bool> {
        Ok(self.number(i)? != 0.0)
    }

    /// Integer argument in 0..=255, fractional part dropped
    fn byte(&self, i: usize) -> Result<u8> {
        let v = self.number(i)?;
        if v.is_finite() && (0.0..256.0).contains(&v) {
            Ok(v as u8)
        } else {
            Err(Error::Protocol(format!(
                "{}: argument {} out of range: {}",
                self.verb, i, v
            )))
        }
    }

    /// Setting value, rounded and clamped to 0..=255
    fn clamped_byte(&self, i: usize) -> Result<u8> {
        let v = self.number(i)?;
        if v.is_nan() {
            return Err(self.mismatch());
        }
        Ok(v.round().clamp(0.0, 255.0) as u8)
    }
}
