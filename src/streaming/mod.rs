//! OSC messaging for readings, commands and replies

pub mod messages;
pub mod osc;

pub use messages::{DeviceInfo, OscPaths, Reading, Reply};
