//! Controller runtime for a 6DOF Stewart platform.
//!
//! Wires the motion core and the wire protocol to real transports, a
//! persistent store and a servo output. The binary in `main.rs` is a thin
//! CLI over this library.

pub mod config;
pub mod controller;
pub mod output;
pub mod store;
pub mod telemetry;
pub mod transport;

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
