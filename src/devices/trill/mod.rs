//! Trill capacitive touch sensors
//!
//! - [`protocol`]: register layout, command encoding and data block decoding
//!
//! Device handles built on top of the protocol live in [`crate::sensor`].

pub mod protocol;
