// Input conditioning ahead of the cueing engine: per-axis LP then notch

use serde::{Deserialize, Serialize};

use super::{
    Biquad, DEFAULT_NOTCH_Q, DEFAULT_Q, ParamError, StageConfig, check_cutoff,
    check_finite, check_q, flag, is_valid_sample_rate,
};
use crate::{AXIS_COUNT, Axis, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputAxisConfig {
    pub lowpass: StageConfig,
    pub notch: StageConfig,
}

impl Default for InputAxisConfig {
    fn default() -> Self {
        Self {
            lowpass: StageConfig::new(false, 20.0, DEFAULT_Q),
            notch: StageConfig::off(DEFAULT_NOTCH_Q),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFilterConfig {
    pub enabled: bool,
    pub axes: [InputAxisConfig; AXIS_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputParam {
    LowpassCutoff,
    LowpassQ,
    NotchCutoff,
    NotchQ,
    LowpassEnabled,
    NotchEnabled,
}

impl InputParam {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "lp_fc" => Some(Self::LowpassCutoff),
            "lp_q" => Some(Self::LowpassQ),
            "notch_fc" => Some(Self::NotchCutoff),
            "notch_q" => Some(Self::NotchQ),
            "lp_en" => Some(Self::LowpassEnabled),
            "notch_en" => Some(Self::NotchEnabled),
            _ => None,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::LowpassCutoff => "LP_FC",
            Self::LowpassQ => "LP_Q",
            Self::NotchCutoff => "NOTCH_FC",
            Self::NotchQ => "NOTCH_Q",
            Self::LowpassEnabled => "LP_EN",
            Self::NotchEnabled => "NOTCH_EN",
        }
    }
}

#[derive(Debug, Clone)]
struct InputAxis {
    lowpass: Biquad,
    lowpass_enabled: bool,
    notch: Biquad,
    notch_enabled: bool,
}

impl InputAxis {
    fn from_config(config: &InputAxisConfig, sample_rate: f64) -> Self {
        Self {
            lowpass: Biquad::lowpass(config.lowpass.cutoff, sample_rate, config.lowpass.q),
            lowpass_enabled: config.lowpass.enabled,
            notch: Biquad::notch(config.notch.cutoff, sample_rate, config.notch.q),
            notch_enabled: config.notch.enabled,
        }
    }

    fn to_config(&self) -> InputAxisConfig {
        InputAxisConfig {
            lowpass: StageConfig::new(self.lowpass_enabled, self.lowpass.cutoff(), self.lowpass.q()),
            notch: StageConfig::new(self.notch_enabled, self.notch.cutoff(), self.notch.q()),
        }
    }

    fn process(&mut self, x: f64) -> f64 {
        let mut y = x;
        if self.lowpass_enabled {
            y = self.lowpass.process(y);
        }
        if self.notch_enabled {
            y = self.notch.process(y);
        }
        y
    }
}

fn q_or(filter: &Biquad) -> f64 {
    if filter.q() > 0.0 {
        filter.q()
    } else {
        filter.kind().default_q()
    }
}

#[derive(Debug, Clone)]
pub struct InputFilter {
    sample_rate: f64,
    enabled: bool,
    axes: [InputAxis; AXIS_COUNT],
}

impl InputFilter {
    pub fn new(config: &InputFilterConfig, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            enabled: config.enabled,
            axes: std::array::from_fn(|i| InputAxis::from_config(&config.axes[i], sample_rate)),
        }
    }

    pub fn to_config(&self) -> InputFilterConfig {
        InputFilterConfig {
            enabled: self.enabled,
            axes: std::array::from_fn(|i| self.axes[i].to_config()),
        }
    }

    pub fn process(&mut self, input: &Pose) -> Pose {
        if !self.enabled {
            return *input;
        }
        Pose(std::array::from_fn(|i| self.axes[i].process(input.0[i])))
    }

    pub fn reset(&mut self) {
        for axis in &mut self.axes {
            axis.lowpass.reset();
            axis.notch.reset();
        }
    }

    /// Same contract as the cueing engine: invalid or unchanged rates are
    /// ignored, filter state is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> bool {
        if !is_valid_sample_rate(sample_rate) || sample_rate == self.sample_rate {
            return false;
        }
        self.sample_rate = sample_rate;
        for axis in &mut self.axes {
            axis.lowpass.set_sample_rate(sample_rate);
            axis.notch.set_sample_rate(sample_rate);
        }
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_param(&mut self, axis: Axis, param: InputParam, value: f64) -> Result<(), ParamError> {
        let value = check_finite(param.key(), value)?;
        let sr = self.sample_rate;
        let ax = &mut self.axes[axis.index()];
        match param {
            InputParam::LowpassCutoff => {
                let q = q_or(&ax.lowpass);
                ax.lowpass.design(check_cutoff(value)?, sr, q);
                ax.lowpass.reset();
            }
            InputParam::LowpassQ => {
                let q = check_q(value)?;
                ax.lowpass.design(ax.lowpass.cutoff(), sr, q);
                ax.lowpass.reset();
            }
            InputParam::NotchCutoff => {
                let q = q_or(&ax.notch);
                ax.notch.design(check_cutoff(value)?, sr, q);
                ax.notch.reset();
            }
            InputParam::NotchQ => {
                let q = check_q(value)?;
                ax.notch.design(ax.notch.cutoff(), sr, q);
                ax.notch.reset();
            }
            InputParam::LowpassEnabled => ax.lowpass_enabled = flag(value),
            InputParam::NotchEnabled => ax.notch_enabled = flag(value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Coefficients, FilterKind};

    #[test]
    fn defaults() {
        let filter = InputFilter::new(&InputFilterConfig::default(), 100.0);
        let config = filter.to_config();
        assert!(!config.enabled);
        assert_eq!(config.axes[0].lowpass, StageConfig::new(false, 20.0, 0.707));
        assert_eq!(config.axes[5].notch, StageConfig::new(false, 0.0, 5.0));
        assert!(filter.axes[0].notch.coefficients().is_identity());
        assert_eq!(filter.axes[0].notch.kind(), FilterKind::Notch);
    }

    #[test]
    fn disabled_filter_passes_through() {
        let mut config = InputFilterConfig::default();
        config.axes[0].lowpass.enabled = true;
        let mut filter = InputFilter::new(&config, 100.0);
        let pose = Pose::new([3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(filter.process(&pose), pose);

        filter.set_enabled(true);
        let out = filter.process(&pose);
        assert!(out[Axis::Surge] < 3.0);
        assert_eq!(out[Axis::Sway], 0.0);
    }

    #[test]
    fn notch_setter_uses_recorded_q() {
        let mut filter = InputFilter::new(&InputFilterConfig::default(), 200.0);
        filter.set_param(Axis::Heave, InputParam::NotchCutoff, 12.0).unwrap();
        assert_eq!(
            filter.axes[2].notch.coefficients(),
            &Coefficients::design(FilterKind::Notch, 12.0, 200.0, 5.0)
        );
        assert!(filter.set_param(Axis::Heave, InputParam::NotchQ, -2.0).is_err());

        assert!(filter.set_sample_rate(100.0));
        assert_eq!(
            filter.axes[2].notch.coefficients(),
            &Coefficients::design(FilterKind::Notch, 12.0, 100.0, 5.0)
        );
    }

    #[test]
    fn param_keys() {
        assert_eq!(InputParam::parse("NOTCH_FC"), Some(InputParam::NotchCutoff));
        assert_eq!(InputParam::parse("lp_q"), Some(InputParam::LowpassQ));
        assert_eq!(InputParam::parse("hp_fc"), None);
    }
}
