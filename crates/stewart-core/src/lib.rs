//! Core motion control for 6DOF Stewart platforms.
//!
//! This crate intentionally avoids any transport-, storage- or
//! actuator-specific dependencies. Everything here is either a pure
//! function or a small state machine driven by the caller.

pub mod dsp;
pub mod kinematics;
pub mod pose;
pub mod scaling;
pub mod supervisor;

pub use pose::{AXIS_COUNT, ActuatorAngles, Axis, Pose};
