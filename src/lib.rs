//! trill-osc - OSC bridge for Trill capacitive touch sensors
//!
//! Discovers sensors on I2C buses, polls them, and streams their readings as
//! OSC over UDP. The same link carries control commands to create, delete
//! and configure devices at runtime.
//!
//! # Architecture
//!
//! ```text
//!        UDP (OSC)                      single control thread
//!  ┌──────────────┐  commands  ┌──────────────────────────────────┐
//!  │ remote peer  │───────────▶│ Bridge                            │
//!  │              │◀───────────│  ├─ Controller                    │
//!  └──────────────┘  readings  │  │   ├─ Registry (id → sensor)    │
//!                    replies   │  │   └─ Box<dyn Bus>              │
//!                              │  └─ Link (UDP / in-memory)        │
//!                              └───────────────┬──────────────────┘
//!                                              │ register blocks
//!                                      ┌───────▼────────┐
//!                                      │ I2C / simulated│
//!                                      └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: poll-and-broadcast loop
//! - [`command`]: control verbs, parsing and execution
//! - [`registry`]: id → device handle map, bus scanning
//! - [`sensor`]: device handle (open, configure, read)
//! - [`centroid`]: touch extraction for sensors without native centroids
//! - [`devices`]: register protocol and bus backends
//! - [`streaming`]: OSC codec and outbound message formats
//! - [`transport`]: datagram link
//! - [`config`]: TOML configuration

pub mod app;
pub mod centroid;
pub mod command;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod registry;
pub mod sensor;
pub mod streaming;
pub mod transport;

pub use error::{Error, Result};
