use std::{
    fmt::Write as _,
    time::{Duration, Instant},
};
use stewart_core::{ActuatorAngles, Pose};

/// `TELEM:` followed by the six angles (radians) then the six pose values.
pub fn format_line(angles: &ActuatorAngles, pose: &Pose) -> String {
    let mut line = String::from("TELEM:");
    for (i, value) in angles.iter().chain(pose.values().iter().copied()).enumerate() {
        if i > 0 {
            line.push(',');
        }
        let _ = write!(line, "{value:.4}");
    }
    line
}

/// Decides when the periodic activity should emit a line.
#[derive(Debug, Clone)]
pub struct TelemetrySchedule {
    rate_hz: u32,
    last: Option<Instant>,
}

impl TelemetrySchedule {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            last: None,
        }
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// 0 disables.
    pub fn set_rate(&mut self, rate_hz: u32) {
        self.rate_hz = rate_hz;
        self.last = None;
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if self.rate_hz == 0 {
            return false;
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(self.rate_hz));
        match self.last {
            Some(last) if now.saturating_duration_since(last) < period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
