// Motion cueing engine: six channel chains plus tilt coordination

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    AxisChannel, ChannelConfig, ChannelParam, CueingConfigError, MAX_GAIN, MAX_Q, ParamError,
    Preset, StageConfig, TiltConfig, TiltCoordination, TiltParam, is_valid_sample_rate,
};
use crate::{AXIS_COUNT, Axis, Pose};

/// Layout version of [`MotionCueingConfig`]; stored configs must match.
pub const SCHEMA_VERSION: u32 = 5;

/// Persistable tuning of the whole engine. Filter state is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionCueingConfig {
    pub schema_version: u32,
    pub sample_rate: f64,
    pub enabled: bool,
    pub preset: u32,
    pub channels: [ChannelConfig; AXIS_COUNT],
    pub tilt: TiltConfig,
}

fn check_stage(axis: usize, stage: &StageConfig) -> Result<(), CueingConfigError> {
    if !(stage.cutoff.is_finite() && stage.cutoff >= 0.0) {
        return Err(CueingConfigError::Cutoff {
            axis,
            value: stage.cutoff,
        });
    }
    if !(0.0..=MAX_Q).contains(&stage.q) {
        return Err(CueingConfigError::Q {
            axis,
            value: stage.q,
        });
    }
    Ok(())
}

impl MotionCueingConfig {
    /// Accept the whole structure or nothing.
    pub fn validate(&self) -> Result<(), CueingConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CueingConfigError::SchemaVersion {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if !is_valid_sample_rate(self.sample_rate) {
            return Err(CueingConfigError::SampleRate(self.sample_rate));
        }
        if Preset::from_index(self.preset).is_none() {
            return Err(CueingConfigError::Preset(self.preset));
        }
        for (axis, ch) in self.channels.iter().enumerate() {
            if !(-MAX_GAIN..=MAX_GAIN).contains(&ch.gain) {
                return Err(CueingConfigError::Gain {
                    axis,
                    value: ch.gain,
                });
            }
            check_stage(axis, &ch.washout)?;
            check_stage(axis, &ch.smoothing)?;
            if let Some(limit) = ch.rate_limit {
                if !(limit.is_finite() && limit >= 0.0) {
                    return Err(CueingConfigError::RateLimit { axis, value: limit });
                }
            }
        }

        let tilt = &self.tilt;
        if !(-MAX_GAIN..=MAX_GAIN).contains(&tilt.surge_gain)
            || !(-MAX_GAIN..=MAX_GAIN).contains(&tilt.sway_gain)
        {
            return Err(CueingConfigError::Tilt("gain"));
        }
        if !(tilt.cutoff.is_finite() && tilt.cutoff >= 0.0) {
            return Err(CueingConfigError::Tilt("cutoff"));
        }
        if !(0.0..=MAX_Q).contains(&tilt.q) {
            return Err(CueingConfigError::Tilt("Q"));
        }
        for washout in [&tilt.surge_washout, &tilt.sway_washout] {
            let ok = washout.cutoff.is_finite()
                && washout.cutoff >= 0.0
                && (0.0..=MAX_Q).contains(&washout.q);
            if !ok {
                return Err(CueingConfigError::Tilt("washout"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MotionCueing {
    sample_rate: f64,
    enabled: bool,
    preset: Preset,
    channels: [AxisChannel; AXIS_COUNT],
    tilt: TiltCoordination,
}

impl MotionCueing {
    /// Disabled engine with unity gains and unset filters.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            enabled: false,
            preset: Preset::Off,
            channels: std::array::from_fn(|_| AxisChannel::default()),
            tilt: TiltCoordination::from_config(&TiltConfig::default(), sample_rate),
        }
    }

    /// Rebuild from stored tuning. Coefficients are recomputed and all
    /// filter state starts clear.
    pub fn from_config(config: &MotionCueingConfig) -> Result<Self, CueingConfigError> {
        config.validate()?;
        let sr = config.sample_rate;
        let preset = Preset::from_index(config.preset).ok_or(CueingConfigError::Preset(config.preset))?;
        Ok(Self {
            sample_rate: sr,
            enabled: config.enabled,
            preset,
            channels: std::array::from_fn(|i| AxisChannel::from_config(&config.channels[i], sr)),
            tilt: TiltCoordination::from_config(&config.tilt, sr),
        })
    }

    pub fn to_config(&self) -> MotionCueingConfig {
        MotionCueingConfig {
            schema_version: SCHEMA_VERSION,
            sample_rate: self.sample_rate,
            enabled: self.enabled,
            preset: self.preset.index(),
            channels: std::array::from_fn(|i| self.channels[i].to_config()),
            tilt: self.tilt.to_config(),
        }
    }

    /// Load a preset's tuning at the current sample rate. Filter state is
    /// kept; call [`MotionCueing::reset`] separately if wanted.
    pub fn apply_preset(&mut self, preset: Preset) {
        let tuning = preset.tuning();
        let sr = self.sample_rate;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            ch.apply_tuning(
                (tuning.washout_cutoff[i], tuning.washout_q[i]),
                (tuning.smoothing_cutoff[i], tuning.smoothing_q[i]),
                tuning.gain[i],
                sr,
            );
        }
        self.tilt.apply_tuning(&tuning.tilt, sr);
        self.preset = preset;
        self.enabled = preset != Preset::Off;
        debug!(preset = preset.name(), sample_rate = sr, "applied cueing preset");
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
        self.tilt.reset();
    }

    /// Cue one pose. Tilt offsets are added onto pitch and roll.
    pub fn process(&mut self, input: &Pose) -> Pose {
        if !self.enabled {
            return *input;
        }
        let mut out = Pose(std::array::from_fn(|i| self.channels[i].process(input.0[i])));
        let (pitch_add, roll_add) = self.tilt.process(input[Axis::Surge], input[Axis::Sway]);
        out[Axis::Pitch] += pitch_add;
        out[Axis::Roll] += roll_add;
        out
    }

    /// Redesign every set filter at `sample_rate`. Out-of-range or
    /// unchanged rates are ignored; returns whether anything changed.
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> bool {
        if !is_valid_sample_rate(sample_rate) || sample_rate == self.sample_rate {
            return false;
        }
        self.sample_rate = sample_rate;
        for ch in &mut self.channels {
            ch.set_sample_rate(sample_rate);
        }
        self.tilt.set_sample_rate(sample_rate);
        true
    }

    pub fn set_channel_param(
        &mut self,
        axis: Axis,
        param: ChannelParam,
        value: f64,
    ) -> Result<(), ParamError> {
        self.channels[axis.index()].set_param(param, value, self.sample_rate)
    }

    pub fn set_tilt_param(&mut self, param: TiltParam, value: f64) -> Result<(), ParamError> {
        self.tilt.set_param(param, value, self.sample_rate)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel(&self, axis: Axis) -> &AxisChannel {
        &self.channels[axis.index()]
    }

    pub fn tilt(&self) -> &TiltCoordination {
        &self.tilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Coefficients;

    #[test]
    fn off_is_pass_through() {
        let mut mca = MotionCueing::new(100.0);
        mca.apply_preset(Preset::Off);
        assert!(!mca.enabled());
        let pose = Pose::new([1.0, -2.0, 0.5, 0.1, -0.1, 0.2]);
        for _ in 0..10 {
            assert_eq!(mca.process(&pose), pose);
        }
    }

    #[test]
    fn presets_set_enables_from_cutoffs() {
        let mut mca = MotionCueing::new(100.0);
        mca.apply_preset(Preset::Moderate);
        assert!(mca.enabled());
        let surge = mca.channel(Axis::Surge).to_config();
        assert_eq!(surge.washout, StageConfig::new(true, 0.8, 0.6));
        assert_eq!(surge.smoothing, StageConfig::new(true, 12.0, 0.707));
        assert_eq!(mca.channel(Axis::Heave).gain(), 1.2);

        let tilt = mca.tilt().to_config();
        assert!(tilt.enabled);
        assert_eq!(tilt.sway_washout, tilt.surge_washout);

        mca.apply_preset(Preset::Off);
        let surge = mca.channel(Axis::Surge);
        assert!(!surge.to_config().washout.enabled);
        assert_eq!(surge.smoothing().coefficients(), &Coefficients::IDENTITY);
    }

    #[test]
    fn washout_returns_sustained_input_to_centre() {
        let mut mca = MotionCueing::new(100.0);
        mca.apply_preset(Preset::Aggressive);
        let step = Pose::new([0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        let first = mca.process(&step);
        assert!(first[Axis::Heave] > 0.0);
        let mut last = first;
        for _ in 0..5000 {
            last = mca.process(&step);
        }
        assert!(last[Axis::Heave].abs() < 1e-3, "{last:?}");
    }

    #[test]
    fn tilt_adds_to_pitch_and_roll() {
        let mut mca = MotionCueing::new(100.0);
        mca.apply_preset(Preset::RacePro);
        for axis in Axis::ALL {
            mca.set_channel_param(axis, ChannelParam::Gain, 0.0).unwrap();
        }
        let mut out = Pose::HOME;
        for _ in 0..50 {
            out = mca.process(&Pose::new([1.0, -1.0, 0.0, 0.0, 0.0, 0.0]));
        }
        assert_eq!(out[Axis::Surge], 0.0);
        assert!(out[Axis::Pitch] > 0.0);
        assert!(out[Axis::Roll] < 0.0);
    }

    #[test]
    fn sample_rate_change_is_idempotent() {
        let mut mca = MotionCueing::new(100.0);
        mca.apply_preset(Preset::Gentle);
        assert!(mca.set_sample_rate(250.0));
        let once = mca.to_config();
        assert!(!mca.set_sample_rate(250.0));
        assert!(!mca.set_sample_rate(0.0));
        assert!(!mca.set_sample_rate(1e6));
        assert_eq!(mca.to_config(), once);
        assert_eq!(once.sample_rate, 250.0);
        assert_eq!(
            mca.channel(Axis::Yaw).smoothing().coefficients(),
            &Coefficients::design(crate::dsp::FilterKind::LowPass, 6.0, 250.0, 0.707)
        );
    }

    #[test]
    fn config_round_trip_rebuilds_engine() {
        let mut mca = MotionCueing::new(120.0);
        mca.apply_preset(Preset::RacePro);
        mca.set_channel_param(Axis::Yaw, ChannelParam::RateLimit, 0.02).unwrap();
        let config = mca.to_config();
        config.validate().unwrap();

        let rebuilt = MotionCueing::from_config(&config).unwrap();
        assert_eq!(rebuilt.to_config(), config);
        assert_eq!(rebuilt.preset(), Preset::RacePro);
    }

    #[test]
    fn validation_rejects_wholesale() {
        let good = MotionCueing::new(100.0).to_config();
        good.validate().unwrap();

        let mut bad = good.clone();
        bad.schema_version = 4;
        assert_eq!(
            MotionCueing::from_config(&bad).unwrap_err(),
            CueingConfigError::SchemaVersion {
                found: 4,
                expected: 5
            }
        );

        let mut bad = good.clone();
        bad.sample_rate = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.preset = 9;
        assert_eq!(bad.validate(), Err(CueingConfigError::Preset(9)));

        let mut bad = good.clone();
        bad.channels[3].gain = 101.0;
        assert_eq!(
            bad.validate(),
            Err(CueingConfigError::Gain {
                axis: 3,
                value: 101.0
            })
        );

        let mut bad = good.clone();
        bad.channels[1].smoothing.q = f64::NAN;
        assert!(matches!(bad.validate(), Err(CueingConfigError::Q { axis: 1, .. })));
    }
}
