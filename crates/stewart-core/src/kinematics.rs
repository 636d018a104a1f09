// Inverse kinematics for rotary-actuator Stewart platforms

use std::fmt;

// Submodules for platform description and the closed-form solver
pub mod geometry;
pub mod solver;

pub use geometry::{
    ActuatorDef, CompactGeometry, GeometryConfig, GeometryError, GeometryParam, PlatformGeometry,
};
pub use solver::{solve, solve_checked, validate};

/// Per-actuator limit flags: bit k set means actuator k is at or beyond its
/// physical range (or cannot reach the commanded pose at all).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityMask(u8);

impl ValidityMask {
    /// Every actuator flagged.
    pub const ALL: ValidityMask = ValidityMask(0x3F);

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn with(mut self, actuator: usize) -> Self {
        self.0 |= 1 << actuator;
        self
    }

    pub const fn contains(&self, actuator: usize) -> bool {
        self.0 & (1 << actuator) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Display for ValidityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_flags() {
        let mask = ValidityMask::new().with(0).with(5);
        assert!(mask.contains(0) && mask.contains(5) && !mask.contains(3));
        assert_eq!(mask.bits(), 0b100001);
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.to_string(), "100001");
        assert!(ValidityMask::new().is_empty());
    }
}
