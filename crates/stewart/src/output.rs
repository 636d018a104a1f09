// Actuation boundary: computed angles leave the controller here

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{f64::consts::FRAC_PI_4, sync::Arc};
use stewart_core::AXIS_COUNT;
use stewart_proto::{MAX_PULSE_PER_RAD, PULSE_MAX_US, PULSE_MIN_US};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ServoCalibrationError {
    #[error("servo {servo} center {center} outside {PULSE_MIN_US}..={PULSE_MAX_US}")]
    Center { servo: usize, center: u16 },

    #[error("pulse_per_rad {0} outside (0, {MAX_PULSE_PER_RAD})")]
    PulsePerRad(f64),
}

/// Receives one complete batch of six actuator angles (radians) per update.
pub trait ServoOutput: Send {
    fn commit(&mut self, angles: &[f64; AXIS_COUNT]);

    /// New pulse calibration from the peer.
    fn set_calibration(&mut self, _calibration: &ServoCalibration) {}
}

/// Per-servo pulse mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoCalibration {
    /// Pulse width at zero angle, microseconds.
    pub center: [u16; AXIS_COUNT],
    /// Microseconds per radian of arm rotation.
    pub pulse_per_rad: f64,
    /// Mirrored servos rotate the other way.
    pub inverted: [bool; AXIS_COUNT],
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            center: [1500; AXIS_COUNT],
            pulse_per_rad: 800.0 / FRAC_PI_4,
            inverted: [true, false, true, false, true, false],
        }
    }
}

impl ServoCalibration {
    pub fn validate(&self) -> Result<(), ServoCalibrationError> {
        if let Some((servo, &center)) = self
            .center
            .iter()
            .enumerate()
            .find(|(_, c)| !(PULSE_MIN_US..=PULSE_MAX_US).contains(c))
        {
            return Err(ServoCalibrationError::Center { servo, center });
        }
        let ppr = self.pulse_per_rad;
        if !(ppr > 0.0 && ppr < MAX_PULSE_PER_RAD) {
            return Err(ServoCalibrationError::PulsePerRad(ppr));
        }
        Ok(())
    }

    pub fn pulse(&self, servo: usize, angle: f64) -> u16 {
        let center = f64::from(self.center[servo]);
        let offset = (angle * self.pulse_per_rad).trunc();
        let pulse = if self.inverted[servo] {
            center + offset
        } else {
            center - offset
        };
        if !pulse.is_finite() {
            return self.center[servo];
        }
        pulse.clamp(f64::from(PULSE_MIN_US), f64::from(PULSE_MAX_US)) as u16
    }

    pub fn pulses(&self, angles: &[f64; AXIS_COUNT]) -> [u16; AXIS_COUNT] {
        std::array::from_fn(|i| self.pulse(i, angles[i]))
    }
}

/// Hobby-servo output: angles become clamped pulse widths.
#[derive(Debug, Clone)]
pub struct PulseOutput {
    calibration: ServoCalibration,
    pulses: [u16; AXIS_COUNT],
}

impl PulseOutput {
    pub fn new(calibration: ServoCalibration) -> Self {
        Self {
            pulses: calibration.center,
            calibration,
        }
    }

    pub fn pulses(&self) -> [u16; AXIS_COUNT] {
        self.pulses
    }
}

impl ServoOutput for PulseOutput {
    fn commit(&mut self, angles: &[f64; AXIS_COUNT]) {
        self.pulses = self.calibration.pulses(angles);
        trace!(pulses = ?self.pulses, "servo pulses");
    }

    fn set_calibration(&mut self, calibration: &ServoCalibration) {
        self.calibration = *calibration;
    }
}

/// Keeps every committed batch; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    commits: Arc<Mutex<Vec<[f64; AXIS_COUNT]>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> Vec<[f64; AXIS_COUNT]> {
        self.commits.lock().clone()
    }

    pub fn last(&self) -> Option<[f64; AXIS_COUNT]> {
        self.commits.lock().last().copied()
    }
}

impl ServoOutput for RecordingOutput {
    fn commit(&mut self, angles: &[f64; AXIS_COUNT]) {
        self.commits.lock().push(*angles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_ranges() {
        assert_eq!(ServoCalibration::default().validate(), Ok(()));

        let mut cal = ServoCalibration::default();
        cal.center[4] = 2500;
        assert_eq!(
            cal.validate(),
            Err(ServoCalibrationError::Center { servo: 4, center: 2500 })
        );

        let mut cal = ServoCalibration::default();
        cal.pulse_per_rad = -50.0;
        assert_eq!(cal.validate(), Err(ServoCalibrationError::PulsePerRad(-50.0)));
        cal.pulse_per_rad = f64::NAN;
        assert!(cal.validate().is_err());
    }

    #[test]
    fn zero_angle_is_center() {
        let cal = ServoCalibration::default();
        assert_eq!(cal.pulses(&[0.0; AXIS_COUNT]), [1500; AXIS_COUNT]);
    }

    #[test]
    fn inversion_and_clamp() {
        let cal = ServoCalibration::default();
        // 0.1 rad * 1018.59 us/rad
        let pulses = cal.pulses(&[0.1; AXIS_COUNT]);
        assert_eq!(pulses, [1601, 1399, 1601, 1399, 1601, 1399]);

        let pulses = cal.pulses(&[1.5; AXIS_COUNT]);
        assert_eq!(pulses, [2200, 800, 2200, 800, 2200, 800]);
    }

    #[test]
    fn pulse_output_tracks_calibration() {
        let mut out = PulseOutput::new(ServoCalibration::default());
        let mut cal = ServoCalibration::default();
        cal.center[1] = 1480;
        out.set_calibration(&cal);
        out.commit(&[0.0; AXIS_COUNT]);
        assert_eq!(out.pulses()[1], 1480);
    }
}
