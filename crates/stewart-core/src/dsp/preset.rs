// Named cueing tunings
//
// Axis order: surge, sway, heave, roll, pitch, yaw.

use serde::{Deserialize, Serialize};

use crate::AXIS_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Pass-through; disables the engine.
    #[default]
    Off,
    /// Light washout, wide bandwidth (truck, flight).
    Gentle,
    /// Balanced washout (general driving).
    Moderate,
    /// Tight washout, fast return.
    Aggressive,
    /// Strong onset, aggressive washout.
    RacePro,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PresetTilt {
    pub enabled: bool,
    pub cutoff: f64,
    pub q: f64,
    pub surge_gain: f64,
    pub sway_gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PresetTuning {
    pub washout_cutoff: [f64; AXIS_COUNT],
    pub smoothing_cutoff: [f64; AXIS_COUNT],
    pub gain: [f64; AXIS_COUNT],
    pub washout_q: [f64; AXIS_COUNT],
    pub smoothing_q: [f64; AXIS_COUNT],
    pub tilt: PresetTilt,
}

const Q6: [f64; AXIS_COUNT] = [0.707; AXIS_COUNT];

const OFF: PresetTuning = PresetTuning {
    washout_cutoff: [0.0; AXIS_COUNT],
    smoothing_cutoff: [0.0; AXIS_COUNT],
    gain: [1.0; AXIS_COUNT],
    washout_q: Q6,
    smoothing_q: Q6,
    tilt: PresetTilt {
        enabled: false,
        cutoff: 0.5,
        q: 0.707,
        surge_gain: 0.0,
        sway_gain: 0.0,
    },
};

const GENTLE: PresetTuning = PresetTuning {
    washout_cutoff: [0.3, 0.3, 0.4, 0.3, 0.3, 0.3],
    smoothing_cutoff: [8.0, 8.0, 8.0, 6.0, 6.0, 6.0],
    gain: [1.0; AXIS_COUNT],
    washout_q: [0.5; AXIS_COUNT],
    smoothing_q: Q6,
    tilt: PresetTilt {
        enabled: true,
        cutoff: 0.3,
        q: 0.707,
        surge_gain: 0.08,
        sway_gain: 0.08,
    },
};

const MODERATE: PresetTuning = PresetTuning {
    washout_cutoff: [0.8, 0.8, 1.0, 0.5, 0.5, 0.8],
    smoothing_cutoff: [12.0, 12.0, 10.0, 8.0, 8.0, 10.0],
    gain: [1.0, 1.0, 1.2, 1.0, 1.0, 0.8],
    washout_q: [0.6, 0.6, 0.6, 0.5, 0.5, 0.6],
    smoothing_q: Q6,
    tilt: PresetTilt {
        enabled: true,
        cutoff: 0.5,
        q: 0.707,
        surge_gain: 0.15,
        sway_gain: 0.15,
    },
};

const AGGRESSIVE: PresetTuning = PresetTuning {
    washout_cutoff: [1.5, 1.5, 2.0, 1.0, 1.0, 1.5],
    smoothing_cutoff: [15.0, 15.0, 12.0, 10.0, 10.0, 12.0],
    gain: [1.2, 1.2, 1.5, 1.0, 1.0, 0.7],
    washout_q: Q6,
    smoothing_q: Q6,
    tilt: PresetTilt {
        enabled: true,
        cutoff: 0.8,
        q: 0.707,
        surge_gain: 0.25,
        sway_gain: 0.25,
    },
};

const RACE_PRO: PresetTuning = PresetTuning {
    washout_cutoff: [2.0, 2.0, 2.5, 1.5, 1.5, 2.0],
    smoothing_cutoff: [20.0, 20.0, 15.0, 12.0, 12.0, 15.0],
    gain: [1.5, 1.5, 1.8, 1.2, 1.2, 0.6],
    washout_q: [0.8, 0.8, 0.8, 0.707, 0.707, 0.8],
    smoothing_q: [0.6, 0.6, 0.6, 0.707, 0.707, 0.6],
    tilt: PresetTilt {
        enabled: true,
        cutoff: 1.0,
        q: 0.6,
        surge_gain: 0.35,
        sway_gain: 0.35,
    },
};

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Off,
        Preset::Gentle,
        Preset::Moderate,
        Preset::Aggressive,
        Preset::RacePro,
    ];

    pub const COUNT: u32 = Self::ALL.len() as u32;

    pub const fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Preset::Off => "off",
            Preset::Gentle => "gentle",
            Preset::Moderate => "moderate",
            Preset::Aggressive => "aggressive",
            Preset::RacePro => "race_pro",
        }
    }

    /// Name (case-insensitive) or table index.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<u32>() {
            return Self::from_index(index);
        }
        let s = s.to_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == s)
    }

    pub(crate) const fn tuning(self) -> &'static PresetTuning {
        match self {
            Preset::Off => &OFF,
            Preset::Gentle => &GENTLE,
            Preset::Moderate => &MODERATE,
            Preset::Aggressive => &AGGRESSIVE,
            Preset::RacePro => &RACE_PRO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_or_index() {
        assert_eq!(Preset::parse("race_pro"), Some(Preset::RacePro));
        assert_eq!(Preset::parse("Moderate"), Some(Preset::Moderate));
        assert_eq!(Preset::parse("0"), Some(Preset::Off));
        assert_eq!(Preset::parse("4"), Some(Preset::RacePro));
        assert_eq!(Preset::parse("5"), None);
        assert_eq!(Preset::parse("sport"), None);
        for preset in Preset::ALL {
            assert_eq!(Preset::from_index(preset.index()), Some(preset));
        }
    }

    #[test]
    fn only_off_is_pass_through() {
        for preset in Preset::ALL {
            let t = preset.tuning();
            let any_filter = t.washout_cutoff.iter().chain(&t.smoothing_cutoff).any(|c| *c > 0.0);
            assert_eq!(any_filter, preset != Preset::Off, "{preset:?}");
            assert_eq!(t.tilt.enabled, preset != Preset::Off);
        }
    }
}
