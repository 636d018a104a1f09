// Per-axis cueing chain: washout HP -> smoothing LP -> gain -> rate limiter

use serde::{Deserialize, Serialize};

use super::{
    Biquad, DEFAULT_Q, FilterKind, ParamError, StageConfig, check_cutoff, check_finite,
    check_gain, check_q, flag,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub washout: StageConfig,
    pub smoothing: StageConfig,
    pub gain: f64,
    /// Largest per-sample change of the output; `None` disables the limiter.
    pub rate_limit: Option<f64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            washout: StageConfig::default(),
            smoothing: StageConfig::default(),
            gain: 1.0,
            rate_limit: None,
        }
    }
}

/// Parameters addressable per channel over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelParam {
    WashoutCutoff,
    WashoutQ,
    SmoothingCutoff,
    SmoothingQ,
    Gain,
    RateLimit,
    WashoutEnabled,
    SmoothingEnabled,
}

impl ChannelParam {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "hp_fc" => Some(Self::WashoutCutoff),
            "hp_q" => Some(Self::WashoutQ),
            "lp_fc" => Some(Self::SmoothingCutoff),
            "lp_q" => Some(Self::SmoothingQ),
            "gain" => Some(Self::Gain),
            "rate" => Some(Self::RateLimit),
            "hp_en" => Some(Self::WashoutEnabled),
            "lp_en" => Some(Self::SmoothingEnabled),
            _ => None,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::WashoutCutoff => "HP_FC",
            Self::WashoutQ => "HP_Q",
            Self::SmoothingCutoff => "LP_FC",
            Self::SmoothingQ => "LP_Q",
            Self::Gain => "GAIN",
            Self::RateLimit => "RATE",
            Self::WashoutEnabled => "HP_EN",
            Self::SmoothingEnabled => "LP_EN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AxisChannel {
    washout: Biquad,
    washout_enabled: bool,
    smoothing: Biquad,
    smoothing_enabled: bool,
    gain: f64,
    rate_limit: Option<f64>,
    last_output: f64,
}

impl Default for AxisChannel {
    fn default() -> Self {
        Self {
            washout: Biquad::new(FilterKind::HighPass),
            washout_enabled: false,
            smoothing: Biquad::new(FilterKind::LowPass),
            smoothing_enabled: false,
            gain: 1.0,
            rate_limit: None,
            last_output: 0.0,
        }
    }
}

impl AxisChannel {
    pub fn from_config(config: &ChannelConfig, sample_rate: f64) -> Self {
        let mut washout = Biquad::new(FilterKind::HighPass);
        washout.design(config.washout.cutoff, sample_rate, config.washout.q);
        let mut smoothing = Biquad::new(FilterKind::LowPass);
        smoothing.design(config.smoothing.cutoff, sample_rate, config.smoothing.q);
        Self {
            washout,
            washout_enabled: config.washout.enabled,
            smoothing,
            smoothing_enabled: config.smoothing.enabled,
            gain: config.gain,
            rate_limit: config.rate_limit.filter(|l| *l > 0.0),
            last_output: 0.0,
        }
    }

    pub fn to_config(&self) -> ChannelConfig {
        ChannelConfig {
            washout: StageConfig::new(self.washout_enabled, self.washout.cutoff(), self.washout.q()),
            smoothing: StageConfig::new(
                self.smoothing_enabled,
                self.smoothing.cutoff(),
                self.smoothing.q(),
            ),
            gain: self.gain,
            rate_limit: self.rate_limit,
        }
    }

    pub fn process(&mut self, x: f64) -> f64 {
        let mut y = x;
        if self.washout_enabled {
            y = self.washout.process(y);
        }
        if self.smoothing_enabled {
            y = self.smoothing.process(y);
        }
        y *= self.gain;
        if let Some(limit) = self.rate_limit {
            let prev = self.last_output;
            y = y.clamp(prev - limit, prev + limit);
        }
        self.last_output = y;
        y
    }

    pub fn reset(&mut self) {
        self.washout.reset();
        self.smoothing.reset();
        self.last_output = 0.0;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.washout.set_sample_rate(sample_rate);
        self.smoothing.set_sample_rate(sample_rate);
    }

    /// Load a preset's tuning: enables follow nonzero cutoffs, limiter off.
    pub(crate) fn apply_tuning(
        &mut self,
        washout: (f64, f64),
        smoothing: (f64, f64),
        gain: f64,
        sample_rate: f64,
    ) {
        self.washout.design(washout.0, sample_rate, washout.1);
        self.washout_enabled = washout.0 > 0.0;
        self.smoothing.design(smoothing.0, sample_rate, smoothing.1);
        self.smoothing_enabled = smoothing.0 > 0.0;
        self.gain = gain;
        self.rate_limit = None;
    }

    /// Apply one parameter; a redesigned stage has its own state cleared.
    pub fn set_param(
        &mut self,
        param: ChannelParam,
        value: f64,
        sample_rate: f64,
    ) -> Result<(), ParamError> {
        let value = check_finite(param.key(), value)?;
        match param {
            ChannelParam::WashoutCutoff => {
                let q = q_or_default(self.washout.q());
                self.washout.design(check_cutoff(value)?, sample_rate, q);
                self.washout.reset();
            }
            ChannelParam::WashoutQ => {
                let q = check_q(value)?;
                self.washout.design(self.washout.cutoff(), sample_rate, q);
                self.washout.reset();
            }
            ChannelParam::SmoothingCutoff => {
                let q = q_or_default(self.smoothing.q());
                self.smoothing.design(check_cutoff(value)?, sample_rate, q);
                self.smoothing.reset();
            }
            ChannelParam::SmoothingQ => {
                let q = check_q(value)?;
                self.smoothing.design(self.smoothing.cutoff(), sample_rate, q);
                self.smoothing.reset();
            }
            ChannelParam::Gain => self.gain = check_gain(value)?,
            ChannelParam::RateLimit => {
                self.rate_limit = (value > 0.0).then_some(value);
            }
            ChannelParam::WashoutEnabled => self.washout_enabled = flag(value),
            ChannelParam::SmoothingEnabled => self.smoothing_enabled = flag(value),
        }
        Ok(())
    }

    pub fn washout(&self) -> &Biquad {
        &self.washout
    }

    pub fn smoothing(&self) -> &Biquad {
        &self.smoothing
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn rate_limit(&self) -> Option<f64> {
        self.rate_limit
    }
}

fn q_or_default(q: f64) -> f64 {
    if q > 0.0 { q } else { DEFAULT_Q }
}
