//! In-memory link for testing

use super::Link;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Link backed by shared queues; clones see the same traffic
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Default)]
struct MockLinkInner {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
    fail_sends: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a datagram to be received
    pub fn inject(&self, datagram: Vec<u8>) {
        self.inner.lock().inbound.push_back(datagram);
    }

    /// Datagrams sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().outbound.clone()
    }

    /// Take and clear the sent datagrams
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.inner.lock().outbound)
    }

    pub fn pending_inbound(&self) -> usize {
        self.inner.lock().inbound.len()
    }

    /// Make every send fail
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }
}

impl Link for MockLink {
    fn send(&mut self, datagram: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return Err(Error::Transport("send failed".to_string()));
        }
        inner.outbound.push(datagram.to_vec());
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().inbound.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_queues() {
        let link = MockLink::new();
        let mut handle = link.clone();

        link.inject(vec![1, 2]);
        assert_eq!(link.pending_inbound(), 1);
        assert_eq!(handle.recv(Duration::ZERO).unwrap(), Some(vec![1, 2]));
        assert_eq!(handle.recv(Duration::ZERO).unwrap(), None);

        handle.send(&[3]).unwrap();
        assert_eq!(link.sent(), vec![vec![3]]);
        assert_eq!(link.take_sent(), vec![vec![3]]);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_fail_sends() {
        let link = MockLink::new();
        let mut handle = link.clone();
        link.set_fail_sends(true);
        assert!(handle.send(&[1]).is_err());
        assert!(link.sent().is_empty());
    }
}
