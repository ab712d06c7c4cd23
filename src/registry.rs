//! Device registry
//!
//! Maps string ids to open [`TouchSensor`] handles. Iteration order is the
//! id order, so the poll loop visits devices in a stable sequence.

use crate::core::bus::Bus;
use crate::core::types::{DeviceType, PollPolicy};
use crate::error::{Error, Result};
use crate::sensor::{self, TouchSensor};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Addresses probed by [`Registry::scan`]
pub const SCAN_RANGE: RangeInclusive<u8> = 0x20..=0x50;

/// Open device handles by id
#[derive(Debug, Default)]
pub struct Registry {
    sensors: BTreeMap<String, TouchSensor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a device and register it under `id`.
    ///
    /// An existing handle with the same id is replaced. If the open fails the
    /// registry is left as it was.
    pub fn create(
        &mut self,
        bus: &mut dyn Bus,
        id: &str,
        bus_id: u8,
        device_type: DeviceType,
        address: u8,
        poll: PollPolicy,
    ) -> Result<&TouchSensor> {
        let sensor = TouchSensor::open(bus, id, bus_id, device_type, address, poll)?;
        if self.sensors.contains_key(id) {
            log::warn!("{}, replacing", Error::Duplicate(id.to_string()));
        }
        self.sensors.insert(id.to_string(), sensor);
        self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Remove a handle. Returns false if there was none.
    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.sensors.remove(id).is_some();
        if removed {
            log::info!("Deleted '{}'", id);
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.sensors.is_empty() {
            log::info!("Deleted all {} device(s)", self.sensors.len());
        }
        self.sensors.clear();
    }

    pub fn get(&self, id: &str) -> Option<&TouchSensor> {
        self.sensors.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TouchSensor> {
        self.sensors.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sensors.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TouchSensor> {
        self.sensors.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TouchSensor> {
        self.sensors.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Probe every address in [`SCAN_RANGE`] on `bus_id`, in order
    pub fn scan(bus: &mut dyn Bus, bus_id: u8) -> Vec<(u8, DeviceType)> {
        let found: Vec<(u8, DeviceType)> = SCAN_RANGE
            .filter_map(|address| {
                sensor::probe(&mut *bus, bus_id, address).map(|id| (address, id.device_type))
            })
            .collect();
        log::info!("Bus {}: {} device(s) found", bus_id, found.len());
        found
    }

    /// Open one handle per device found by [`Registry::scan`].
    ///
    /// Ids are `"{bus}-{address}-{type}"` with the address in decimal.
    /// Returns the ids created.
    pub fn create_all(&mut self, bus: &mut dyn Bus, bus_id: u8, poll: PollPolicy) -> Vec<String> {
        let mut created = Vec::new();
        for (address, device_type) in Self::scan(bus, bus_id) {
            let id = format!("{}-{}-{}", bus_id, address, device_type);
            match self.create(bus, &id, bus_id, device_type, address, poll) {
                Ok(_) => created.push(id),
                Err(e) => log::warn!("Failed to open '{}': {}", id, e),
            }
        }
        created
    }
}
