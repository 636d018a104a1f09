// Workspace calibration and raw-input mapping
//
// Each axis is searched alone from home, in both directions, for the largest
// displacement that keeps every actuator inside its range. The platform is
// treated as symmetric: one scale for the linear axes, one for the angular.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::kinematics::{PlatformGeometry, validate};
use crate::{AXIS_COUNT, Axis, Pose};

/// Bisection steps per search; well past f64 resolution for these ranges.
pub const SEARCH_ITERATIONS: usize = 50;

pub const DEFAULT_MARGIN: f64 = 0.9;

/// Upper bound of the angular search, degrees.
const ANGULAR_SEARCH_LIMIT_DEG: f64 = 90.0;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("bit depth {0} out of range 8-16")]
pub struct BitDepthError(pub u8);

/// Resolution of the raw input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BitDepth(u8);

impl BitDepth {
    pub const MIN: u8 = 8;
    pub const MAX: u8 = 16;

    pub fn new(bits: u8) -> Result<Self, BitDepthError> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(BitDepthError(bits))
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Largest raw value a channel can carry.
    pub const fn max_raw(self) -> u32 {
        (1u32 << self.0) - 1
    }
}

impl Default for BitDepth {
    fn default() -> Self {
        Self(12)
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = BitDepthError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<BitDepth> for u8 {
    fn from(depth: BitDepth) -> u8 {
        depth.0
    }
}

/// Per-axis safe displacement. Linear axes in length units, angular axes in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScaling {
    pub scale: [f64; AXIS_COUNT],
    pub angular: [bool; AXIS_COUNT],
}

impl AxisScaling {
    pub fn new(linear: f64, angular: f64) -> Self {
        let mut scale = [0.0; AXIS_COUNT];
        let mut is_angular = [false; AXIS_COUNT];
        for axis in Axis::ALL {
            let i = axis.index();
            is_angular[i] = axis.is_angular();
            scale[i] = if axis.is_angular() { angular } else { linear };
        }
        Self {
            scale,
            angular: is_angular,
        }
    }

    /// Collapse per-axis limits into one linear and one angular scale,
    /// shrink by `margin` and floor to whole units.
    pub fn from_limits(limits: &[f64; AXIS_COUNT], margin: f64) -> Self {
        let min_of = |angular: bool| {
            Axis::ALL
                .iter()
                .filter(|a| a.is_angular() == angular)
                .map(|a| limits[a.index()])
                .fold(f64::INFINITY, f64::min)
        };
        let linear = (min_of(false) * margin).floor().max(0.0);
        let angular = (min_of(true) * margin).floor().max(0.0);
        Self::new(linear, angular)
    }

    pub fn linear(&self) -> f64 {
        self.scale[Axis::Surge.index()]
    }

    pub fn angular(&self) -> f64 {
        self.scale[Axis::Roll.index()]
    }

    /// Map raw channel values onto a pose. `max_raw / 2` (integer division)
    /// is the neutral value; angular axes come out in radians.
    pub fn map(&self, raw: &[f64; AXIS_COUNT], max_raw: u32) -> Pose {
        let home = max_raw / 2;
        if home == 0 {
            return Pose::HOME;
        }
        let home = f64::from(home);
        Pose(std::array::from_fn(|i| {
            let value = (raw[i] - home) * (self.scale[i] / home);
            if self.angular[i] {
                value.to_radians()
            } else {
                value
            }
        }))
    }
}

fn single_axis_pose(axis: Axis, magnitude: f64) -> Pose {
    let mut pose = Pose::HOME;
    pose[axis] = if axis.is_angular() {
        magnitude.to_radians()
    } else {
        magnitude
    };
    pose
}

/// Bisect for the largest |displacement| along `axis` in direction `sign`
/// that validates.
fn search(geometry: &PlatformGeometry, axis: Axis, upper: f64, sign: f64) -> f64 {
    let (mut lo, mut hi) = (0.0, upper);
    for _ in 0..SEARCH_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if validate(&single_axis_pose(axis, sign * mid), geometry).is_empty() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Largest safe single-axis displacement per axis, taking the tighter of the
/// two directions.
pub fn search_limits(geometry: &PlatformGeometry) -> [f64; AXIS_COUNT] {
    let reach = geometry.max_reach();
    let mut limits = [0.0; AXIS_COUNT];
    for axis in Axis::ALL {
        let upper = if axis.is_angular() {
            ANGULAR_SEARCH_LIMIT_DEG
        } else {
            reach
        };
        let positive = search(geometry, axis, upper, 1.0);
        let negative = search(geometry, axis, upper, -1.0);
        limits[axis.index()] = positive.min(negative);
        debug!(axis = axis.name(), positive, negative, "workspace limit");
    }
    limits
}

/// Derive the input scaling for `geometry`.
pub fn calibrate(geometry: &PlatformGeometry, margin: f64) -> AxisScaling {
    let limits = search_limits(geometry);
    let scaling = AxisScaling::from_limits(&limits, margin);
    debug!(
        linear = scaling.linear(),
        angular = scaling.angular(),
        margin,
        "calibrated axis scaling"
    );
    scaling
}
