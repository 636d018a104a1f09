// Pose and actuator vocabulary shared by every stage of the pipeline

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

pub const AXIS_COUNT: usize = 6;

/// One degree of freedom of the platform, in pose order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Surge,
    Sway,
    Heave,
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::Surge,
        Axis::Sway,
        Axis::Heave,
        Axis::Roll,
        Axis::Pitch,
        Axis::Yaw,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < AXIS_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Rotational axes carry radians past the input-scaling boundary.
    pub const fn is_angular(self) -> bool {
        matches!(self, Axis::Roll | Axis::Pitch | Axis::Yaw)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Axis::Surge => "surge",
            Axis::Sway => "sway",
            Axis::Heave => "heave",
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }

    /// Parse an axis from its name (case-insensitive) or its index.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index);
        }
        match s.to_lowercase().as_str() {
            "surge" => Some(Axis::Surge),
            "sway" => Some(Axis::Sway),
            "heave" => Some(Axis::Heave),
            "roll" => Some(Axis::Roll),
            "pitch" => Some(Axis::Pitch),
            "yaw" => Some(Axis::Yaw),
            _ => None,
        }
    }
}

/// Commanded platform pose: surge, sway, heave in length units followed by
/// roll, pitch, yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose(pub [f64; AXIS_COUNT]);

impl Pose {
    /// The zero pose is always the platform's home configuration.
    pub const HOME: Pose = Pose([0.0; AXIS_COUNT]);

    pub const fn new(values: [f64; AXIS_COUNT]) -> Self {
        Self(values)
    }

    pub const fn values(&self) -> &[f64; AXIS_COUNT] {
        &self.0
    }

    pub fn is_home(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Index<Axis> for Pose {
    type Output = f64;

    fn index(&self, axis: Axis) -> &f64 {
        &self.0[axis.index()]
    }
}

impl IndexMut<Axis> for Pose {
    fn index_mut(&mut self, axis: Axis) -> &mut f64 {
        &mut self.0[axis.index()]
    }
}

/// Servo arm angles in radians, one per actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorAngles(pub [f64; AXIS_COUNT]);

impl ActuatorAngles {
    pub const fn values(&self) -> &[f64; AXIS_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }
}

impl Index<usize> for ActuatorAngles {
    type Output = f64;

    fn index(&self, actuator: usize) -> &f64 {
        &self.0[actuator]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_parse() {
        assert_eq!(Axis::parse("surge"), Some(Axis::Surge));
        assert_eq!(Axis::parse("PITCH"), Some(Axis::Pitch));
        assert_eq!(Axis::parse("5"), Some(Axis::Yaw));
        assert_eq!(Axis::parse("6"), None);
        assert_eq!(Axis::parse("w"), None);
    }

    #[test]
    fn angular_axes() {
        let angular: Vec<_> = Axis::ALL.iter().filter(|a| a.is_angular()).collect();
        assert_eq!(angular, [&Axis::Roll, &Axis::Pitch, &Axis::Yaw]);
    }

    #[test]
    fn pose_indexing_by_axis() {
        let mut pose = Pose::HOME;
        assert!(pose.is_home());
        pose[Axis::Heave] = 2.0;
        assert_eq!(pose.0[2], 2.0);
        assert!(!pose.is_home());
    }
}
