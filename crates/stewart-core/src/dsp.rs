// Signal processing for motion cueing and input conditioning
//
// Everything is built on one biquad primitive. Tuning parameters live in
// serde-friendly config structs; the engines own filter state and rebuild
// their coefficients from those parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod biquad;
pub mod channel;
pub mod cueing;
pub mod input_filter;
pub mod preset;
pub mod tilt;

pub use biquad::{Biquad, Coefficients, FilterKind};
pub use channel::{AxisChannel, ChannelConfig, ChannelParam};
pub use cueing::{MotionCueing, MotionCueingConfig, SCHEMA_VERSION};
pub use input_filter::{InputAxisConfig, InputFilter, InputFilterConfig, InputParam};
pub use preset::Preset;
pub use tilt::{TiltConfig, TiltCoordination, TiltParam};

/// Q used when a stage has none recorded.
pub const DEFAULT_Q: f64 = 0.707;
pub const DEFAULT_NOTCH_Q: f64 = 5.0;

pub const MAX_SAMPLE_RATE: f64 = 100_000.0;
pub const MAX_GAIN: f64 = 100.0;
pub const MAX_Q: f64 = 100.0;

/// Tuning of one filter stage. A cutoff of 0 means unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub enabled: bool,
    pub cutoff: f64,
    pub q: f64,
}

impl StageConfig {
    pub const fn new(enabled: bool, cutoff: f64, q: f64) -> Self {
        Self { enabled, cutoff, q }
    }

    pub const fn off(q: f64) -> Self {
        Self::new(false, 0.0, q)
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::off(DEFAULT_Q)
    }
}

/// Reasons a stored or supplied cueing configuration is rejected as a whole.
#[derive(Debug, Error, PartialEq)]
pub enum CueingConfigError {
    #[error("schema version {found} does not match {expected}")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("sample rate {0} out of range")]
    SampleRate(f64),

    #[error("preset index {0} out of range")]
    Preset(u32),

    #[error("axis {axis}: gain {value} out of range")]
    Gain { axis: usize, value: f64 },

    #[error("axis {axis}: Q {value} out of range")]
    Q { axis: usize, value: f64 },

    #[error("axis {axis}: cutoff {value} invalid")]
    Cutoff { axis: usize, value: f64 },

    #[error("axis {axis}: rate limit {value} invalid")]
    RateLimit { axis: usize, value: f64 },

    #[error("tilt {0} invalid")]
    Tilt(&'static str),
}

/// A single parameter write that was refused; nothing changed.
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("{0} must be finite")]
    NonFinite(&'static str),

    #[error("{name} out of range {min}..{max}")]
    Range {
        name: &'static str,
        min: f64,
        max: f64,
    },
}

pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamError::NonFinite(name))
    }
}

/// Q setters only accept (0, MAX_Q].
pub(crate) fn check_q(value: f64) -> Result<f64, ParamError> {
    if value > 0.0 && value <= MAX_Q {
        Ok(value)
    } else {
        Err(ParamError::Range {
            name: "Q",
            min: 0.0,
            max: MAX_Q,
        })
    }
}

pub(crate) fn check_gain(value: f64) -> Result<f64, ParamError> {
    if (-MAX_GAIN..=MAX_GAIN).contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::Range {
            name: "gain",
            min: -MAX_GAIN,
            max: MAX_GAIN,
        })
    }
}

/// Cutoffs at or below zero clear the stage.
pub(crate) fn check_cutoff(value: f64) -> Result<f64, ParamError> {
    check_finite("cutoff", value).map(|v| v.max(0.0))
}

pub(crate) fn is_valid_sample_rate(sample_rate: f64) -> bool {
    sample_rate > 0.0 && sample_rate <= MAX_SAMPLE_RATE
}

pub(crate) fn flag(value: f64) -> bool {
    value != 0.0
}
