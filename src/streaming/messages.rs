//! Outbound message types and the OSC address namespace
//!
//! # Address Namespace
//!
//! | Direction | Address | Arguments |
//! |-----------|---------|-----------|
//! | in | `<root>/command/<verb>` | per verb |
//! | out | `<root>/readings/<id>/touches` | count, loc0, size0, ... |
//! | out | `<root>/readings/<id>/touchXY` | count, x, y, size |
//! | out | `<root>/readings/<id>/raw\|baseline\|diff` | one value per channel |
//! | out | `<root>/commandreply/<verb>` | id, code / id, type, address, mode |
//!
//! All reading values are `f32`. Channel values are normalised by the 12-bit
//! full scale; touch values are already in 0..1.

use crate::command::Verb;
use crate::core::types::{CompoundTouch, DeviceType, Mode, Topology, Touch};
use crate::error::{Error, Result};
use crate::sensor::{TouchFrame, TouchSensor};
use rosc::{OscMessage, OscType};

/// Address builder/parser for one root prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscPaths {
    root: String,
}

impl OscPaths {
    /// `root` is normalised to a leading slash and no trailing slash
    pub fn new(root: &str) -> Self {
        let trimmed = root.trim().trim_matches('/');
        let root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Extract the verb from `<root>/command/<verb>`.
    ///
    /// The verb must be exactly one non-empty segment.
    pub fn command_verb<'a>(&self, addr: &'a str) -> Result<&'a str> {
        let verb = addr
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix("/command/"))
            .ok_or_else(|| Error::Protocol(format!("Address outside namespace: {}", addr)))?;
        if verb.is_empty() || verb.contains('/') {
            return Err(Error::Protocol(format!("Malformed command address: {}", addr)));
        }
        Ok(verb)
    }

    pub fn command(&self, verb: &str) -> String {
        format!("{}/command/{}", self.root, verb)
    }

    pub fn reading(&self, id: &str, kind: &str) -> String {
        format!("{}/readings/{}/{}", self.root, id, kind)
    }

    pub fn reply(&self, verb: &str) -> String {
        format!("{}/commandreply/{}", self.root, verb)
    }
}

impl Default for OscPaths {
    fn default() -> Self {
        Self::new("/trill")
    }
}

/// One outbound reading, ready to encode
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// 1-D touch list (native or extracted)
    Touches(Vec<Touch>),
    /// 2-D compound touch, `None` when untouched
    TouchXY(Option<CompoundTouch>),
    /// Normalised channel values in a non-centroid mode
    Channels { mode: Mode, values: Vec<f32> },
}

impl Reading {
    /// Reading for a device's current values
    pub fn from_sensor(sensor: &TouchSensor) -> Self {
        Self::format(
            sensor.topology(),
            sensor.mode(),
            sensor.frame(),
            sensor.raw(),
            sensor.full_scale(),
        )
    }

    /// Pure formatting of (topology, mode, values).
    ///
    /// Channel counts are divided by `full_scale`, the count for 1.0 at the
    /// device's scan resolution.
    pub fn format(
        topology: Topology,
        mode: Mode,
        frame: &TouchFrame,
        raw: &[u16],
        full_scale: f32,
    ) -> Self {
        match (mode, topology) {
            (Mode::Centroid, Topology::TwoD) => Reading::TouchXY(frame.compound_touch()),
            (Mode::Centroid, Topology::OneD | Topology::RawArray) => match frame {
                TouchFrame::Linear(touches) => Reading::Touches(touches.clone()),
                _ => Reading::Touches(Vec::new()),
            },
            (mode, _) => Reading::Channels {
                mode,
                values: raw.iter().map(|&v| v as f32 / full_scale).collect(),
            },
        }
    }

    /// Last address segment
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Touches(_) => "touches",
            Reading::TouchXY(_) => "touchXY",
            Reading::Channels { mode, .. } => mode.name(),
        }
    }

    pub fn args(&self) -> Vec<OscType> {
        match self {
            Reading::Touches(touches) => {
                let mut args = Vec::with_capacity(1 + touches.len() * 2);
                args.push(OscType::Float(touches.len() as f32));
                for t in touches {
                    args.push(OscType::Float(t.location));
                    args.push(OscType::Float(t.size));
                }
                args
            }
            Reading::TouchXY(None) => vec![OscType::Float(0.0)],
            Reading::TouchXY(Some(touch)) => vec![
                OscType::Float(1.0),
                OscType::Float(touch.x),
                OscType::Float(touch.y),
                OscType::Float(touch.size),
            ],
            Reading::Channels { values, .. } => {
                values.iter().map(|&v| OscType::Float(v)).collect()
            }
        }
    }

    pub fn to_message(&self, paths: &OscPaths, id: &str) -> OscMessage {
        OscMessage {
            addr: paths.reading(id, self.kind()),
            args: self.args(),
        }
    }
}

/// Identity and state of one device, as reported by `new`/`list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub device_type: DeviceType,
    pub address: u8,
    pub mode: Mode,
}

impl From<&TouchSensor> for DeviceInfo {
    fn from(sensor: &TouchSensor) -> Self {
        Self {
            id: sensor.id().to_string(),
            device_type: sensor.device_type(),
            address: sensor.address(),
            mode: sensor.mode(),
        }
    }
}

/// Reply to a control command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Outcome of a device-communicating verb: code 0 ok, -1 failed
    Status { verb: Verb, id: String, ok: bool },
    /// Device description for `new`/`list`
    Info { verb: Verb, info: DeviceInfo },
}

impl Reply {
    pub fn verb(&self) -> Verb {
        match self {
            Reply::Status { verb, .. } | Reply::Info { verb, .. } => *verb,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Reply::Status { id, .. } => id,
            Reply::Info { info, .. } => &info.id,
        }
    }

    pub fn to_message(&self, paths: &OscPaths) -> OscMessage {
        let args = match self {
            Reply::Status { id, ok, .. } => vec![
                OscType::String(id.clone()),
                OscType::Float(if *ok { 0.0 } else { -1.0 }),
            ],
            Reply::Info { info, .. } => vec![
                OscType::String(info.id.clone()),
                OscType::String(info.device_type.name().to_string()),
                OscType::Float(info.address as f32),
                OscType::String(info.mode.name().to_string()),
            ],
        };
        OscMessage {
            addr: paths.reply(self.verb().name()),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let paths = OscPaths::new("/trill/");
        assert_eq!(paths.root(), "/trill");
        assert_eq!(paths.reading("1-32-bar", "touches"), "/trill/readings/1-32-bar/touches");
        assert_eq!(paths.reply("new"), "/trill/commandreply/new");
        assert_eq!(paths.command("listAll"), "/trill/command/listAll");
        assert_eq!(OscPaths::new("touch").root(), "/touch");
    }

    #[test]
    fn test_command_verb() {
        let paths = OscPaths::default();
        assert_eq!(paths.command_verb("/trill/command/setMode").unwrap(), "setMode");
        assert!(paths.command_verb("/trill/command/").is_err());
        assert!(paths.command_verb("/trill/command/a/b").is_err());
        assert!(paths.command_verb("/trill/commands/new").is_err());
        assert!(paths.command_verb("/other/command/new").is_err());
        assert!(paths.command_verb("/trill").is_err());
    }

    #[test]
    fn test_format_2d_untouched() {
        let frame = TouchFrame::Planar {
            vertical: vec![],
            horizontal: vec![],
        };
        let reading = Reading::format(Topology::TwoD, Mode::Centroid, &frame, &[], 4096.0);
        assert_eq!(reading, Reading::TouchXY(None));
        assert_eq!(reading.args(), vec![OscType::Float(0.0)]);
    }

    #[test]
    fn test_format_2d_touched() {
        let frame = TouchFrame::Planar {
            vertical: vec![Touch {
                location: 0.2,
                size: 0.5,
            }],
            horizontal: vec![Touch {
                location: 0.7,
                size: 0.5,
            }],
        };
        let reading = Reading::format(Topology::TwoD, Mode::Centroid, &frame, &[], 4096.0);
        assert_eq!(reading.kind(), "touchXY");
        assert_eq!(
            reading.args(),
            vec![
                OscType::Float(1.0),
                OscType::Float(0.7),
                OscType::Float(0.2),
                OscType::Float(0.5)
            ]
        );
    }

    #[test]
    fn test_format_touches() {
        let frame = TouchFrame::Linear(vec![
            Touch {
                location: 0.1,
                size: 0.3,
            },
            Touch {
                location: 0.9,
                size: 0.4,
            },
        ]);
        let reading = Reading::format(Topology::OneD, Mode::Centroid, &frame, &[], 4096.0);
        let msg = reading.to_message(&OscPaths::default(), "b");
        assert_eq!(msg.addr, "/trill/readings/b/touches");
        assert_eq!(msg.args.len(), 5);
        assert_eq!(msg.args[0], OscType::Float(2.0));
        assert_eq!(msg.args[3], OscType::Float(0.9));

        let empty = Reading::format(
            Topology::RawArray,
            Mode::Centroid,
            &TouchFrame::Empty,
            &[],
            4096.0,
        );
        assert_eq!(empty.args(), vec![OscType::Float(0.0)]);
    }

    #[test]
    fn test_format_channels_by_mode() {
        let raw = [0u16, 2048, 4095];
        let reading = Reading::format(
            Topology::OneD,
            Mode::Baseline,
            &TouchFrame::Empty,
            &raw,
            4096.0,
        );
        assert_eq!(reading.kind(), "baseline");
        assert_eq!(
            reading.args(),
            vec![
                OscType::Float(0.0),
                OscType::Float(0.5),
                OscType::Float(4095.0 / 4096.0)
            ]
        );

        let diff = Reading::format(Topology::TwoD, Mode::Diff, &TouchFrame::Empty, &raw, 4096.0);
        assert_eq!(diff.kind(), "diff");
    }

    #[test]
    fn test_format_channels_above_12_bits() {
        let raw = [4100u16, 8191];
        let reading = Reading::format(
            Topology::OneD,
            Mode::Raw,
            &TouchFrame::Empty,
            &raw,
            8192.0,
        );
        assert_eq!(
            reading.args(),
            vec![
                OscType::Float(4100.0 / 8192.0),
                OscType::Float(8191.0 / 8192.0)
            ]
        );
    }

    #[test]
    fn test_reply_messages() {
        let paths = OscPaths::default();
        let status = Reply::Status {
            verb: Verb::SetPrescaler,
            id: "b".to_string(),
            ok: false,
        };
        let msg = status.to_message(&paths);
        assert_eq!(msg.addr, "/trill/commandreply/setPrescaler");
        assert_eq!(
            msg.args,
            vec![OscType::String("b".into()), OscType::Float(-1.0)]
        );

        let info = Reply::Info {
            verb: Verb::List,
            info: DeviceInfo {
                id: "1-32-bar".to_string(),
                device_type: DeviceType::Bar,
                address: 0x20,
                mode: Mode::Centroid,
            },
        };
        let msg = info.to_message(&paths);
        assert_eq!(msg.addr, "/trill/commandreply/list");
        assert_eq!(
            msg.args,
            vec![
                OscType::String("1-32-bar".into()),
                OscType::String("bar".into()),
                OscType::Float(32.0),
                OscType::String("centroid".into()),
            ]
        );
    }
}
