//! Hardware bus over `embedded-hal` I2C
//!
//! [`HalBus`] adapts any blocking `embedded_hal::i2c::I2c` implementation to
//! the [`Bus`] trait. Numbered buses are opened lazily on first use through
//! an opener closure and kept open afterwards; a failed open is retried on
//! the next access.
//!
//! On Linux the `i2c` feature provides [`HalBus::linux`], which opens
//! `/dev/i2c-N` character devices via `linux-embedded-hal`.

use crate::core::bus::Bus;
use crate::error::{Error, Result};
use embedded_hal::i2c::I2c;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

type Opener<I> = Box<dyn FnMut(u8) -> Result<I> + Send>;

/// [`Bus`] over `embedded-hal` I2C peripherals, one per bus number
pub struct HalBus<I> {
    buses: HashMap<u8, I>,
    opener: Opener<I>,
}

impl<I: I2c + Send> HalBus<I> {
    pub fn new(opener: impl FnMut(u8) -> Result<I> + Send + 'static) -> Self {
        Self {
            buses: HashMap::new(),
            opener: Box::new(opener),
        }
    }

    fn handle(&mut self, bus: u8) -> Result<&mut I> {
        match self.buses.entry(bus) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let i2c = (self.opener)(bus)?;
                log::info!("Opened I2C bus {}", bus);
                Ok(entry.insert(i2c))
            }
        }
    }
}

#[cfg(all(target_os = "linux", feature = "i2c"))]
impl HalBus<linux_embedded_hal::I2cdev> {
    /// Open buses from a path template, `{bus}` replaced by the bus number
    pub fn linux(path_template: &str) -> Self {
        let template = path_template.to_string();
        Self::new(move |bus| {
            let path = template.replace("{bus}", &bus.to_string());
            linux_embedded_hal::I2cdev::new(&path)
                .map_err(|e| Error::Transport(format!("Failed to open {}: {:?}", path, e)))
        })
    }
}

fn transfer_error(bus: u8, address: u8, e: impl embedded_hal::i2c::Error) -> Error {
    Error::Transport(format!(
        "I2C bus {} at {:#04x}: {:?}",
        bus,
        address,
        e.kind()
    ))
}

impl<I: I2c + Send> Bus for HalBus<I> {
    fn write(&mut self, bus: u8, address: u8, bytes: &[u8]) -> Result<()> {
        self.handle(bus)?
            .write(address, bytes)
            .map_err(|e| transfer_error(bus, address, e))
    }

    fn read(&mut self, bus: u8, address: u8, buf: &mut [u8]) -> Result<()> {
        self.handle(bus)?
            .read(address, buf)
            .map_err(|e| transfer_error(bus, address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Peripheral with a single device that echoes a fixed answer
    struct FakeI2c {
        device: u8,
        answer: Vec<u8>,
        written: Vec<Vec<u8>>,
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> std::result::Result<(), Self::Error> {
            if address != self.device {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.written.push(bytes.to_vec()),
                    Operation::Read(buf) => {
                        let n = buf.len().min(self.answer.len());
                        buf[..n].copy_from_slice(&self.answer[..n]);
                    }
                }
            }
            Ok(())
        }
    }

    fn fake_bus(opens: Arc<AtomicUsize>) -> HalBus<FakeI2c> {
        HalBus::new(move |bus| {
            opens.fetch_add(1, Ordering::SeqCst);
            if bus == 9 {
                return Err(Error::Transport("no such bus".to_string()));
            }
            Ok(FakeI2c {
                device: 0x20,
                answer: vec![0xFE, 1, 3, 0],
                written: Vec::new(),
            })
        })
    }

    #[test]
    fn test_read_write_through_peripheral() {
        let mut bus = fake_bus(Arc::new(AtomicUsize::new(0)));
        bus.write(1, 0x20, &[0x00, 0xFF]).unwrap();

        let mut answer = [0u8; 4];
        bus.read(1, 0x20, &mut answer).unwrap();
        assert_eq!(answer, [0xFE, 1, 3, 0]);
        assert_eq!(bus.buses[&1].written, vec![vec![0x00, 0xFF]]);
    }

    #[test]
    fn test_nack_is_transport_error() {
        let mut bus = fake_bus(Arc::new(AtomicUsize::new(0)));
        let err = bus.write(1, 0x21, &[0x04]).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_bus_opened_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut bus = fake_bus(opens.clone());
        bus.write(1, 0x20, &[0x04]).unwrap();
        bus.write(1, 0x20, &[0x04]).unwrap();
        bus.write(2, 0x20, &[0x04]).unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_open_retried() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut bus = fake_bus(opens.clone());
        assert!(bus.write(9, 0x20, &[0x04]).is_err());
        assert!(bus.write(9, 0x20, &[0x04]).is_err());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }
}
