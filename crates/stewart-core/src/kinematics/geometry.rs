// Platform geometry: the compact symmetric description and the generalized
// per-actuator form the solver runs on

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

use crate::AXIS_COUNT;

/// Physical servo range of the stock rotary actuators (±60°).
pub const DEFAULT_SERVO_LIMIT_DEG: f64 = 60.0;

// Topology of the standard 3-pair symmetric arrangement
const X_SIGN: [f64; AXIS_COUNT] = [1.0, 1.0, 1.0, -1.0, -1.0, -1.0];
const ANGLE_SIGN: [f64; AXIS_COUNT] = [1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
const OFFSET_ANGLE: [f64; AXIS_COUNT] = [
    PI / 6.0,
    PI / 6.0,
    -PI / 2.0,
    -PI / 2.0,
    PI / 6.0,
    PI / 6.0,
];

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("actuator {actuator}: {name} must be positive, got {value}")]
    NonPositiveLength {
        actuator: usize,
        name: &'static str,
        value: f64,
    },

    #[error("actuator {actuator}: joint coordinates must be finite")]
    NonFinite { actuator: usize },

    #[error("home height must be finite, got {0}")]
    HomeHeight(f64),

    #[error("servo range {min}..{max} is empty")]
    ServoRange { min: f64, max: f64 },
}

/// One rotary actuator: servo shaft on the base, ball joint on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDef {
    /// Servo shaft position on the base, base frame.
    pub base_joint: [f64; 3],
    /// Rod joint on the platform, platform frame.
    pub platform_joint: [f64; 3],
    /// Servo axis orientation in the base x-y plane (radians).
    pub beta: f64,
    /// Servo arm length (L1).
    pub arm_length: f64,
    /// Connecting rod length (L2).
    pub rod_length: f64,
}

/// Generalized per-actuator platform description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformGeometry {
    pub actuators: [ActuatorDef; AXIS_COUNT],
    /// Platform joint height above the base at the home pose.
    pub home_height: f64,
    pub servo_min: f64,
    pub servo_max: f64,
}

impl PlatformGeometry {
    pub fn validate(&self) -> Result<(), GeometryError> {
        for (actuator, def) in self.actuators.iter().enumerate() {
            for (name, value) in [("arm length", def.arm_length), ("rod length", def.rod_length)] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(GeometryError::NonPositiveLength {
                        actuator,
                        name,
                        value,
                    });
                }
            }
            let finite = def
                .base_joint
                .iter()
                .chain(def.platform_joint.iter())
                .chain(std::iter::once(&def.beta))
                .all(|v| v.is_finite());
            if !finite {
                return Err(GeometryError::NonFinite { actuator });
            }
        }
        if !self.home_height.is_finite() {
            return Err(GeometryError::HomeHeight(self.home_height));
        }
        if !(self.servo_min < self.servo_max) {
            return Err(GeometryError::ServoRange {
                min: self.servo_min,
                max: self.servo_max,
            });
        }
        Ok(())
    }

    /// Longest fully extended leg; bounds the linear workspace search.
    pub fn max_reach(&self) -> f64 {
        self.actuators
            .iter()
            .map(|a| a.arm_length + a.rod_length)
            .fold(0.0, f64::max)
    }
}

/// Compact description of the symmetric 3-pair topology. Lengths share one
/// unit; angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactGeometry {
    /// Radius of the platform joint circle (`RD`).
    pub platform_radius: f64,
    /// Radius of the base servo-shaft circle (`PD`).
    pub base_radius: f64,
    /// Servo arm length (`L1`).
    pub arm_length: f64,
    /// Connecting rod length (`L2`).
    pub rod_length: f64,
    /// Neutral platform height (`height`).
    pub home_height: f64,
    /// Platform joint rotation offset (`theta_r`).
    pub platform_rotation: f64,
    /// Base joint rotation offset (`theta_p`).
    pub base_rotation: f64,
    /// Per-servo axis orientation.
    pub servo_axis: [f64; AXIS_COUNT],
    pub servo_min: f64,
    pub servo_max: f64,
}

impl Default for CompactGeometry {
    fn default() -> Self {
        Self {
            platform_radius: 15.75,
            base_radius: 16.0,
            arm_length: 7.25,
            rod_length: 28.5,
            home_height: 25.517,
            platform_rotation: 10.0,
            base_rotation: 30.0,
            servo_axis: [150.0, -90.0, 30.0, 150.0, -90.0, 30.0],
            servo_min: -DEFAULT_SERVO_LIMIT_DEG,
            servo_max: DEFAULT_SERVO_LIMIT_DEG,
        }
    }
}

impl CompactGeometry {
    pub fn get(&self, param: GeometryParam) -> f64 {
        match param {
            GeometryParam::PlatformRadius => self.platform_radius,
            GeometryParam::BaseRadius => self.base_radius,
            GeometryParam::ArmLength => self.arm_length,
            GeometryParam::RodLength => self.rod_length,
            GeometryParam::HomeHeight => self.home_height,
            GeometryParam::PlatformRotation => self.platform_rotation,
            GeometryParam::BaseRotation => self.base_rotation,
        }
    }

    pub fn set(&mut self, param: GeometryParam, value: f64) {
        let slot = match param {
            GeometryParam::PlatformRadius => &mut self.platform_radius,
            GeometryParam::BaseRadius => &mut self.base_radius,
            GeometryParam::ArmLength => &mut self.arm_length,
            GeometryParam::RodLength => &mut self.rod_length,
            GeometryParam::HomeHeight => &mut self.home_height,
            GeometryParam::PlatformRotation => &mut self.platform_rotation,
            GeometryParam::BaseRotation => &mut self.base_rotation,
        };
        *slot = value;
    }
}

impl From<&CompactGeometry> for PlatformGeometry {
    fn from(c: &CompactGeometry) -> Self {
        let actuators = std::array::from_fn(|k| {
            let p_angle = OFFSET_ANGLE[k] + ANGLE_SIGN[k] * c.platform_rotation.to_radians();
            let b_angle = OFFSET_ANGLE[k] + ANGLE_SIGN[k] * c.base_rotation.to_radians();
            ActuatorDef {
                platform_joint: [
                    X_SIGN[k] * c.platform_radius * p_angle.cos(),
                    c.platform_radius * p_angle.sin(),
                    0.0,
                ],
                base_joint: [
                    X_SIGN[k] * c.base_radius * b_angle.cos(),
                    c.base_radius * b_angle.sin(),
                    0.0,
                ],
                beta: c.servo_axis[k].to_radians(),
                arm_length: c.arm_length,
                rod_length: c.rod_length,
            }
        });
        PlatformGeometry {
            actuators,
            home_height: c.home_height,
            servo_min: c.servo_min.to_radians(),
            servo_max: c.servo_max.to_radians(),
        }
    }
}

/// Named compact-geometry parameters, addressable over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryParam {
    PlatformRadius,
    BaseRadius,
    ArmLength,
    RodLength,
    HomeHeight,
    PlatformRotation,
    BaseRotation,
}

impl GeometryParam {
    pub const ALL: [GeometryParam; 7] = [
        GeometryParam::PlatformRadius,
        GeometryParam::BaseRadius,
        GeometryParam::ArmLength,
        GeometryParam::RodLength,
        GeometryParam::HomeHeight,
        GeometryParam::PlatformRotation,
        GeometryParam::BaseRotation,
    ];

    /// Parse the wire key (case-sensitive, as the firmware accepts it).
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    pub const fn key(self) -> &'static str {
        match self {
            GeometryParam::PlatformRadius => "RD",
            GeometryParam::BaseRadius => "PD",
            GeometryParam::ArmLength => "L1",
            GeometryParam::RodLength => "L2",
            GeometryParam::HomeHeight => "height",
            GeometryParam::PlatformRotation => "theta_r",
            GeometryParam::BaseRotation => "theta_p",
        }
    }
}

/// Geometry as configured: either form, resolved to one canonical
/// [`PlatformGeometry`] for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryConfig {
    Compact(CompactGeometry),
    Generalized(PlatformGeometry),
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig::Compact(CompactGeometry::default())
    }
}

impl GeometryConfig {
    pub fn to_platform(&self) -> Result<PlatformGeometry, GeometryError> {
        let platform = match self {
            GeometryConfig::Compact(c) => PlatformGeometry::from(c),
            GeometryConfig::Generalized(p) => p.clone(),
        };
        platform.validate()?;
        Ok(platform)
    }

    pub fn as_compact(&self) -> Option<&CompactGeometry> {
        match self {
            GeometryConfig::Compact(c) => Some(c),
            GeometryConfig::Generalized(_) => None,
        }
    }
}
