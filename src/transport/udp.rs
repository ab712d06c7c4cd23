//! UDP link
//!
//! One socket bound to the listen address serves both directions. Datagrams
//! go to the configured remote address. With `rebind_on_first_packet` the
//! peer is replaced by the origin of the first inbound datagram; later
//! origins are ignored.

use super::{Link, MAX_DATAGRAM};
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Smallest read timeout accepted by the socket (zero means "block forever")
const MIN_TIMEOUT: Duration = Duration::from_micros(100);

pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
    rebind_pending: bool,
    buf: Vec<u8>,
}

impl UdpLink {
    /// Bind `listen` and resolve `remote`
    pub fn bind(listen: &str, remote: &str, rebind_on_first_packet: bool) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .map_err(|e| Error::Transport(format!("Failed to bind {}: {}", listen, e)))?;
        let peer = resolve(remote)?;
        log::info!(
            "OSC listening on {}, sending to {}",
            socket.local_addr()?,
            peer
        );
        Ok(Self {
            socket,
            peer,
            rebind_pending: rebind_on_first_packet,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| Error::Config(format!("Bad remote address {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| Error::Config(format!("Remote address {} did not resolve", addr)))
}

impl Link for UdpLink {
    fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.socket
            .send_to(datagram, self.peer)
            .map_err(|e| Error::Transport(format!("Send to {} failed: {}", self.peer, e)))?;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        self.socket.set_read_timeout(Some(timeout.max(MIN_TIMEOUT)))?;
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, origin)) => {
                if self.rebind_pending {
                    self.rebind_pending = false;
                    log::info!("Sending to {} (origin of first packet)", origin);
                    self.peer = origin;
                }
                Ok(Some(self.buf[..len].to_vec()))
            }
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(rebind: bool) -> (UdpLink, UdpSocket) {
        let remote = UdpSocket::bind("127.0.0.1:0").unwrap();
        let remote_addr = remote.local_addr().unwrap().to_string();
        let link = UdpLink::bind("127.0.0.1:0", &remote_addr, rebind).unwrap();
        remote
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        (link, remote)
    }

    #[test]
    fn test_send_and_receive() {
        let (mut link, remote) = pair(false);
        link.send(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = remote.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        remote
            .send_to(b"cmd", link.local_addr().unwrap())
            .unwrap();
        let got = link.recv(Duration::from_secs(2)).unwrap();
        assert_eq!(got, Some(b"cmd".to_vec()));
    }

    #[test]
    fn test_timeout_is_none() {
        let (mut link, _remote) = pair(false);
        assert_eq!(link.recv(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn test_rebind_on_first_packet_only() {
        let (mut link, remote) = pair(true);
        let first = UdpSocket::bind("127.0.0.1:0").unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").unwrap();
        let local = link.local_addr().unwrap();

        first.send_to(b"a", local).unwrap();
        link.recv(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(link.peer(), first.local_addr().unwrap());

        second.send_to(b"b", local).unwrap();
        link.recv(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(link.peer(), first.local_addr().unwrap());
        assert_ne!(link.peer(), remote.local_addr().unwrap());
    }

    #[test]
    fn test_no_rebind_by_default() {
        let (mut link, remote) = pair(false);
        let other = UdpSocket::bind("127.0.0.1:0").unwrap();
        other.send_to(b"a", link.local_addr().unwrap()).unwrap();
        link.recv(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(link.peer(), remote.local_addr().unwrap());
    }

    #[test]
    fn test_bind_failure() {
        let (link, _remote) = pair(false);
        let taken = link.local_addr().unwrap().to_string();
        assert!(UdpLink::bind(&taken, "127.0.0.1:9", false).is_err());
    }
}
