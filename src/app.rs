//! Poll-and-broadcast loop
//!
//! # Cycle
//!
//! ```text
//! loop until stop:
//!   1. poll      read every device whose policy is not Never (id order),
//!                send one reading per successful read
//!   2. drain     receive datagrams (short timeout each), dispatch every
//!                message, send replies, until the socket is empty
//!   3. sleep     loopSleep, cut into slices; each slice waits on the link,
//!                so stop and inbound commands are seen within one slice
//! ```
//!
//! Everything runs on the calling thread. A slow bus transfer delays the
//! whole cycle; there is no per-device timeout.

use crate::command::Controller;
use crate::config::PollingConfig;
use crate::core::bus::Bus;
use crate::core::types::PollPolicy;
use crate::registry::Registry;
use crate::streaming::{OscPaths, Reading, osc};
use crate::transport::Link;
use rosc::OscMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Shortest wait per sleep slice
const MIN_SLICE: Duration = Duration::from_millis(1);

/// Read every due device once.
///
/// `Once` devices fall back to `Never` before they are read, so a failed
/// one-shot read is not retried. Failed reads are logged and produce no
/// reading.
pub fn poll_due(registry: &mut Registry, bus: &mut dyn Bus) -> Vec<(String, Reading)> {
    let mut readings = Vec::new();
    for sensor in registry.iter_mut() {
        match sensor.poll_policy() {
            PollPolicy::Never => continue,
            PollPolicy::Once => sensor.set_poll_policy(PollPolicy::Never),
            PollPolicy::Always => {}
        }
        match sensor.read(bus) {
            Ok(()) => readings.push((sensor.id().to_string(), Reading::from_sensor(sensor))),
            Err(e) => log::warn!("'{}': read failed: {}", sensor.id(), e),
        }
    }
    readings
}

/// Daemon main loop: owns the controller and the OSC link
pub struct Bridge<L: Link> {
    controller: Controller,
    link: L,
    paths: OscPaths,
    sleep_slice: Duration,
    receive_timeout: Duration,
    running: Arc<AtomicBool>,
}

impl<L: Link> Bridge<L> {
    pub fn new(
        controller: Controller,
        link: L,
        paths: OscPaths,
        polling: &PollingConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            link,
            paths,
            sleep_slice: polling.sleep_slice(),
            receive_timeout: polling.receive_timeout(),
            running,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run until the stop flag clears
    pub fn run(&mut self) {
        log::info!(
            "Bridge running under {} ({} device(s))",
            self.paths.root(),
            self.controller.registry().len()
        );
        let mut cycles: u64 = 0;
        let started = Instant::now();

        while self.is_running() {
            self.cycle();
            self.sleep();
            cycles += 1;
        }

        log::info!(
            "Bridge stopped after {} cycles in {:.1}s",
            cycles,
            started.elapsed().as_secs_f32()
        );
    }

    /// One poll + drain pass, without the sleep
    pub fn cycle(&mut self) {
        self.poll_and_broadcast();
        if self.is_running() {
            self.drain_inbound();
        }
    }

    /// Read due devices and send their readings. Returns the number sent.
    pub fn poll_and_broadcast(&mut self) -> usize {
        let (registry, bus) = self.controller.split_mut();
        let readings = poll_due(registry, bus);

        let mut sent = 0;
        for (id, reading) in readings {
            let message = reading.to_message(&self.paths, &id);
            if message.args.is_empty() {
                continue;
            }
            log::trace!("{} {:?}", message.addr, message.args);
            if self.send(message) {
                sent += 1;
            }
        }
        sent
    }

    /// Dispatch everything queued on the link. Returns messages handled.
    pub fn drain_inbound(&mut self) -> usize {
        self.drain_within(self.receive_timeout)
    }

    /// Wait up to `first_wait` for a datagram, then dispatch it and
    /// everything queued behind it.
    fn drain_within(&mut self, first_wait: Duration) -> usize {
        let mut handled = 0;
        let mut wait = first_wait;
        while self.is_running() {
            let datagram = match self.link.recv(wait) {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Receive failed: {}", e);
                    break;
                }
            };

            wait = self.receive_timeout;

            let messages = match osc::decode(&datagram) {
                Ok(messages) => messages,
                Err(e) => {
                    log::warn!("Dropped {} byte datagram: {}", datagram.len(), e);
                    continue;
                }
            };

            for message in messages {
                if !self.is_running() {
                    break;
                }
                let replies = self.controller.handle_message(&self.paths, &message);
                handled += 1;
                for reply in replies {
                    self.send(reply.to_message(&self.paths));
                }
            }
        }
        handled
    }

    fn send(&mut self, message: OscMessage) -> bool {
        let addr = message.addr.clone();
        let result = osc::encode(message).and_then(|datagram| self.link.send(&datagram));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send {}: {}", addr, e);
                false
            }
        }
    }

    /// Sleep `loopSleep` in slices, serving the link while waiting and
    /// returning early on stop
    fn sleep(&mut self) {
        let deadline = Instant::now() + self.controller.loop_sleep();
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = self.sleep_slice.max(MIN_SLICE).min(deadline - now);
            let started = Instant::now();
            if self.drain_within(slice) == 0 {
                // Some links return before the timeout
                let waited = started.elapsed();
                if waited < slice {
                    thread::sleep(slice - waited);
                }
            }
        }
    }
}
