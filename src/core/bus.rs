//! Bus trait definition

use crate::error::Result;
use std::time::Duration;

/// Settle time between writing a command and reading its answer
pub const COMMAND_DELAY: Duration = Duration::from_millis(5);

/// Register-block access to devices on numbered buses.
///
/// Implementations only move bytes; the sensor register protocol lives in
/// [`crate::devices::trill::protocol`]. A device that does not acknowledge
/// must surface as an `Err`, which is how probing detects empty addresses.
pub trait Bus: Send {
    /// Write a block starting at the device's register pointer
    fn write(&mut self, bus: u8, address: u8, bytes: &[u8]) -> Result<()>;

    /// Read `buf.len()` bytes from the device's current register pointer
    fn read(&mut self, bus: u8, address: u8, buf: &mut [u8]) -> Result<()>;

    /// How long the firmware needs after a command before it can be read back
    fn command_delay(&self) -> Duration {
        COMMAND_DELAY
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn write(&mut self, bus: u8, address: u8, bytes: &[u8]) -> Result<()> {
        (**self).write(bus, address, bytes)
    }

    fn read(&mut self, bus: u8, address: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read(bus, address, buf)
    }

    fn command_delay(&self) -> Duration {
        (**self).command_delay()
    }
}
