//! Core abstractions shared across the daemon.
//!
//! - [`bus::Bus`]: Trait to implement for a new bus backend
//! - [`types`]: Device names, modes, poll policies and touch values

pub mod bus;
pub mod types;
