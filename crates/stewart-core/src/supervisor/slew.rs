use serde::{Deserialize, Serialize};

use crate::{AXIS_COUNT, Axis, Pose};

/// Largest per-cycle move: length units for linear axes, radians for
/// angular ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlewSteps {
    pub linear: f64,
    pub angular: f64,
}

impl SlewSteps {
    pub const fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    pub fn is_valid(&self) -> bool {
        self.linear.is_finite() && self.linear > 0.0 && self.angular.is_finite() && self.angular > 0.0
    }

    fn per_axis(&self) -> [f64; AXIS_COUNT] {
        Axis::ALL.map(|a| if a.is_angular() { self.angular } else { self.linear })
    }
}

impl Default for SlewSteps {
    fn default() -> Self {
        Self::new(0.5, 0.05)
    }
}

#[derive(Debug, Clone)]
pub struct SlewLimiter {
    steps: SlewSteps,
    max_step: [f64; AXIS_COUNT],
    current: Option<Pose>,
}

impl SlewLimiter {
    pub fn new(steps: SlewSteps) -> Self {
        Self {
            steps,
            max_step: steps.per_axis(),
            current: None,
        }
    }

    /// Move each axis toward `target` by at most its step. The first call
    /// adopts the target as-is.
    pub fn advance(&mut self, target: &Pose) -> Pose {
        let next = match self.current {
            None => *target,
            Some(current) => Pose(std::array::from_fn(|i| {
                let delta = target.0[i] - current.0[i];
                let step = self.max_step[i];
                if delta.abs() <= step {
                    target.0[i]
                } else {
                    current.0[i] + step.copysign(delta)
                }
            })),
        };
        self.current = Some(next);
        next
    }

    /// Forget the smoothed pose; the next target is adopted directly.
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn reset_to(&mut self, pose: Pose) {
        self.current = Some(pose);
    }

    pub fn current(&self) -> Option<Pose> {
        self.current
    }

    pub fn steps(&self) -> SlewSteps {
        self.steps
    }

    pub fn set_steps(&mut self, steps: SlewSteps) {
        self.steps = steps;
        self.max_step = steps.per_axis();
    }
}
