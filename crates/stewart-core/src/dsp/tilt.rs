// Tilt coordination: sustained surge/sway rendered as pitch/roll

use serde::{Deserialize, Serialize};

use super::preset::PresetTilt;
use super::{
    Biquad, DEFAULT_Q, FilterKind, ParamError, StageConfig, check_cutoff, check_finite,
    check_gain, check_q, flag,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltConfig {
    pub enabled: bool,
    /// Pitch offset per unit of sustained surge.
    pub surge_gain: f64,
    /// Roll offset per unit of sustained sway.
    pub sway_gain: f64,
    /// "Sustained motion" low-pass cutoff shared by both paths.
    pub cutoff: f64,
    pub q: f64,
    /// Washout returning the pitch tilt to level.
    pub surge_washout: StageConfig,
    /// Washout returning the roll tilt to level.
    pub sway_washout: StageConfig,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            surge_gain: 0.0,
            sway_gain: 0.0,
            cutoff: 0.5,
            q: DEFAULT_Q,
            surge_washout: StageConfig::new(true, 0.3, DEFAULT_Q),
            sway_washout: StageConfig::new(true, 0.3, DEFAULT_Q),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltParam {
    Enabled,
    SurgeGain,
    SwayGain,
    Cutoff,
    Q,
}

impl TiltParam {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "en" => Some(Self::Enabled),
            "surge_gain" => Some(Self::SurgeGain),
            "sway_gain" => Some(Self::SwayGain),
            "fc" => Some(Self::Cutoff),
            "q" => Some(Self::Q),
            _ => None,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Enabled => "EN",
            Self::SurgeGain => "SURGE_GAIN",
            Self::SwayGain => "SWAY_GAIN",
            Self::Cutoff => "FC",
            Self::Q => "Q",
        }
    }
}

#[derive(Debug, Clone)]
struct TiltPath {
    sustained: Biquad,
    washout: Biquad,
    washout_enabled: bool,
}

impl TiltPath {
    fn new(cutoff: f64, q: f64, washout: &StageConfig, sample_rate: f64) -> Self {
        let mut hp = Biquad::new(FilterKind::HighPass);
        hp.design(washout.cutoff, sample_rate, washout.q);
        Self {
            sustained: Biquad::lowpass(cutoff, sample_rate, q),
            washout: hp,
            washout_enabled: washout.enabled,
        }
    }

    fn process(&mut self, x: f64, gain: f64) -> f64 {
        let y = self.sustained.process(x) * gain;
        if self.washout_enabled {
            self.washout.process(y)
        } else {
            y
        }
    }

    fn washout_config(&self) -> StageConfig {
        StageConfig::new(self.washout_enabled, self.washout.cutoff(), self.washout.q())
    }

    fn reset(&mut self) {
        self.sustained.reset();
        self.washout.reset();
    }
}

#[derive(Debug, Clone)]
pub struct TiltCoordination {
    enabled: bool,
    surge_gain: f64,
    sway_gain: f64,
    surge: TiltPath,
    sway: TiltPath,
}

impl TiltCoordination {
    pub fn from_config(config: &TiltConfig, sample_rate: f64) -> Self {
        Self {
            enabled: config.enabled,
            surge_gain: config.surge_gain,
            sway_gain: config.sway_gain,
            surge: TiltPath::new(config.cutoff, config.q, &config.surge_washout, sample_rate),
            sway: TiltPath::new(config.cutoff, config.q, &config.sway_washout, sample_rate),
        }
    }

    pub fn to_config(&self) -> TiltConfig {
        TiltConfig {
            enabled: self.enabled,
            surge_gain: self.surge_gain,
            sway_gain: self.sway_gain,
            cutoff: self.surge.sustained.cutoff(),
            q: self.surge.sustained.q(),
            surge_washout: self.surge.washout_config(),
            sway_washout: self.sway.washout_config(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `(pitch_add, roll_add)`; zero when disabled.
    pub fn process(&mut self, surge: f64, sway: f64) -> (f64, f64) {
        if !self.enabled {
            return (0.0, 0.0);
        }
        (
            self.surge.process(surge, self.surge_gain),
            self.sway.process(sway, self.sway_gain),
        )
    }

    pub fn reset(&mut self) {
        self.surge.reset();
        self.sway.reset();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        for path in [&mut self.surge, &mut self.sway] {
            path.sustained.set_sample_rate(sample_rate);
            path.washout.set_sample_rate(sample_rate);
        }
    }

    /// Load a preset's tilt block. Enabled presets get linked washouts,
    /// falling back to 0.3 Hz / default Q when none is recorded.
    pub(crate) fn apply_tuning(&mut self, tuning: &PresetTilt, sample_rate: f64) {
        self.enabled = tuning.enabled;
        self.surge_gain = tuning.surge_gain;
        self.sway_gain = tuning.sway_gain;
        if tuning.cutoff > 0.0 {
            self.surge.sustained.design(tuning.cutoff, sample_rate, tuning.q);
            self.sway.sustained.design(tuning.cutoff, sample_rate, tuning.q);
        }
        if tuning.enabled {
            let washout = &self.surge.washout;
            let fc = if washout.cutoff() > 0.0 { washout.cutoff() } else { 0.3 };
            let wq = if washout.q() > 0.0 { washout.q() } else { DEFAULT_Q };
            for path in [&mut self.surge, &mut self.sway] {
                path.washout.design(fc, sample_rate, wq);
                path.washout_enabled = true;
            }
        }
    }

    pub fn set_param(
        &mut self,
        param: TiltParam,
        value: f64,
        sample_rate: f64,
    ) -> Result<(), ParamError> {
        let value = check_finite(param.key(), value)?;
        match param {
            TiltParam::Enabled => self.enabled = flag(value),
            TiltParam::SurgeGain => self.surge_gain = check_gain(value)?,
            TiltParam::SwayGain => self.sway_gain = check_gain(value)?,
            TiltParam::Cutoff => {
                let cutoff = check_cutoff(value)?;
                let q = self.surge.sustained.q();
                let q = if q > 0.0 { q } else { DEFAULT_Q };
                for path in [&mut self.surge, &mut self.sway] {
                    path.sustained.design(cutoff, sample_rate, q);
                    path.sustained.reset();
                }
            }
            TiltParam::Q => {
                let q = check_q(value)?;
                for path in [&mut self.surge, &mut self.sway] {
                    let cutoff = path.sustained.cutoff();
                    path.sustained.design(cutoff, sample_rate, q);
                    path.sustained.reset();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tilt_adds_nothing() {
        let mut tilt = TiltCoordination::from_config(&TiltConfig::default(), 100.0);
        assert_eq!(tilt.process(5.0, -5.0), (0.0, 0.0));
    }

    #[test]
    fn sustained_surge_tilts_then_levels() {
        let config = TiltConfig {
            enabled: true,
            surge_gain: 0.5,
            sway_gain: 0.5,
            ..TiltConfig::default()
        };
        let mut tilt = TiltCoordination::from_config(&config, 100.0);

        let mut peak: f64 = 0.0;
        let mut last = (0.0, 0.0);
        for _ in 0..6000 {
            last = tilt.process(1.0, 0.0);
            peak = peak.max(last.0);
        }
        assert!(peak > 0.1, "{peak}");
        assert!(last.0.abs() < 1e-3, "{last:?}");
        assert_eq!(last.1, 0.0);
    }

    #[test]
    fn without_washout_tilt_holds() {
        let config = TiltConfig {
            enabled: true,
            surge_gain: 0.5,
            surge_washout: StageConfig::off(DEFAULT_Q),
            ..TiltConfig::default()
        };
        let mut tilt = TiltCoordination::from_config(&config, 100.0);
        let mut last = (0.0, 0.0);
        for _ in 0..3000 {
            last = tilt.process(1.0, 0.0);
        }
        assert!((last.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn setters() {
        let mut tilt = TiltCoordination::from_config(&TiltConfig::default(), 100.0);
        tilt.set_param(TiltParam::Enabled, 1.0, 100.0).unwrap();
        tilt.set_param(TiltParam::Cutoff, 1.0, 100.0).unwrap();
        tilt.set_param(TiltParam::Q, 0.6, 100.0).unwrap();
        assert!(tilt.set_param(TiltParam::Q, -1.0, 100.0).is_err());
        let config = tilt.to_config();
        assert!(config.enabled);
        assert_eq!((config.cutoff, config.q), (1.0, 0.6));
        assert_eq!(TiltParam::parse("surge_gain"), Some(TiltParam::SurgeGain));
    }
}
