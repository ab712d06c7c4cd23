//! Datagram transport for the OSC link

use crate::error::Result;
use std::time::Duration;

mod mock;
mod udp;

pub use mock::MockLink;
pub use udp::UdpLink;

/// Largest datagram accepted
pub const MAX_DATAGRAM: usize = 65_507;

/// Datagram link to the remote OSC peer
pub trait Link: Send {
    /// Send one datagram to the current peer
    fn send(&mut self, datagram: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one inbound datagram.
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}
