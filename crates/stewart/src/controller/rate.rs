use std::time::Instant;

/// Weight of the newest interval in the running average.
const ALPHA: f64 = 0.05;
/// Intervals needed before an estimate is offered.
const MIN_SAMPLES: u32 = 20;
/// Gaps longer than this are pauses, not a rate.
const MAX_INTERVAL_SECS: f64 = 1.0;
/// Relative drift that triggers a filter redesign.
pub const DRIFT: f64 = 0.10;

/// Input sample rate from arrival times, exponentially averaged.
#[derive(Debug, Clone, Default)]
pub struct RateEstimator {
    last: Option<Instant>,
    interval: Option<f64>,
    samples: u32,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arrival; returns the estimated rate in Hz once settled.
    pub fn observe(&mut self, now: Instant) -> Option<f64> {
        if let Some(last) = self.last.replace(now) {
            let dt = now.saturating_duration_since(last).as_secs_f64();
            if dt > 0.0 && dt < MAX_INTERVAL_SECS {
                self.interval = Some(match self.interval {
                    Some(avg) => avg + ALPHA * (dt - avg),
                    None => dt,
                });
                self.samples = self.samples.saturating_add(1);
            }
        }
        if self.samples < MIN_SAMPLES {
            return None;
        }
        self.interval.map(|i| 1.0 / i)
    }
}

pub fn drifted(estimate: f64, current: f64) -> bool {
    (estimate - current).abs() > DRIFT * current
}
