// Shared device state and the sample pipeline
//
// One lock guards everything the pipeline touches. Every acquisition is
// bounded; a caller that cannot get the lock in time skips its work for
// this cycle instead of waiting.

use anyhow::{Context, Result, anyhow};
use parking_lot::{Mutex, MutexGuard};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use stewart_core::{
    ActuatorAngles, Pose,
    dsp::{InputFilter, MotionCueing, MotionCueingConfig, SCHEMA_VERSION},
    kinematics::{GeometryConfig, PlatformGeometry, ValidityMask, solve_checked},
    scaling::{AxisScaling, BitDepth, calibrate},
    supervisor::Supervisor,
};
use stewart_proto::{Event, RawSample};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    output::{ServoCalibration, ServoOutput},
    store::{
        BlobStore, CALIBRATION_KEY, CALIBRATION_SCHEMA, CUEING_KEY, CalibrationBlob,
        decode_versioned, encode,
    },
    telemetry::{TelemetrySchedule, format_line},
};

mod commands;
mod rate;

pub use rate::RateEstimator;

/// Identity strings reported to peers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub device_id: String,
    pub platform: String,
    pub firmware: &'static str,
}

/// Latest pipeline output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub pose: Pose,
    pub angles: ActuatorAngles,
    pub mask: ValidityMask,
}

struct State {
    geometry_config: GeometryConfig,
    geometry: PlatformGeometry,
    margin: f64,
    scaling: AxisScaling,
    bits: BitDepth,
    input_filter: InputFilter,
    cueing: MotionCueing,
    supervisor: Supervisor,
    servo: ServoCalibration,
    output: Box<dyn ServoOutput>,
    telemetry: TelemetrySchedule,
    rate: Option<RateEstimator>,
    last: Snapshot,
}

impl State {
    fn new(config: &Config, output: Box<dyn ServoOutput>) -> Result<Self> {
        let geometry = config
            .geometry
            .to_platform()
            .context("invalid platform geometry")?;
        let sample_rate = config.cueing.sample_rate;
        let mut cueing = MotionCueing::new(sample_rate);
        cueing.apply_preset(config.cueing.preset);

        Ok(Self {
            geometry_config: config.geometry.clone(),
            scaling: calibrate(&geometry, config.scaling.margin),
            geometry,
            margin: config.scaling.margin,
            bits: config.scaling.bits,
            input_filter: InputFilter::new(&config.input_filter, sample_rate),
            cueing,
            supervisor: Supervisor::new(config.safety.slew, config.safety.watchdog_timeout()),
            servo: config.servo,
            output,
            telemetry: TelemetrySchedule::new(config.telemetry.rate_hz),
            rate: config
                .cueing
                .adaptive_sample_rate
                .then(RateEstimator::new),
            last: Snapshot {
                pose: Pose::HOME,
                angles: ActuatorAngles::default(),
                mask: ValidityMask::new(),
            },
        })
    }

    /// Solve, commit all six angles as one batch, then publish.
    fn apply(&mut self, pose: Pose) {
        let (angles, mask) = solve_checked(&pose, &self.geometry);
        if !mask.is_empty() {
            debug!(%mask, "pose outside workspace, clamped");
        }
        self.output.commit(angles.values());
        self.last = Snapshot { pose, angles, mask };
    }

    fn set_geometry(&mut self, config: GeometryConfig, geometry: PlatformGeometry) {
        self.scaling = calibrate(&geometry, self.margin);
        self.geometry_config = config;
        self.geometry = geometry;
        info!(
            linear = self.scaling.linear(),
            angular = self.scaling.angular(),
            "geometry changed, scales recomputed"
        );
    }

    fn set_servo(&mut self, servo: ServoCalibration) {
        self.servo = servo;
        self.output.set_calibration(&servo);
    }

    fn restore_calibration(&mut self, blob: CalibrationBlob) -> Result<()> {
        let geometry = blob.geometry.to_platform()?;
        if !blob.slew.is_valid() {
            return Err(anyhow!("stored slew steps are invalid"));
        }
        blob.servo
            .validate()
            .context("stored servo calibration is out of range")?;
        self.set_geometry(blob.geometry, geometry);
        self.bits = blob.bits;
        self.set_servo(blob.servo);
        self.supervisor.set_steps(blob.slew);
        Ok(())
    }

    fn calibration_blob(&self) -> CalibrationBlob {
        CalibrationBlob {
            schema_version: CALIBRATION_SCHEMA,
            geometry: self.geometry_config.clone(),
            bits: self.bits,
            servo: self.servo,
            slew: self.supervisor.steps(),
        }
    }

    fn adapt_sample_rate(&mut self, now: Instant) {
        let Some(estimate) = self.rate.as_mut().and_then(|r| r.observe(now)) else {
            return;
        };
        if rate::drifted(estimate, self.cueing.sample_rate()) && self.cueing.set_sample_rate(estimate)
        {
            self.input_filter.set_sample_rate(estimate);
            info!(sample_rate = estimate, "input rate changed, filters redesigned");
        }
    }
}

pub struct Controller {
    state: Mutex<State>,
    store: Option<Arc<dyn BlobStore>>,
    lock_wait: Duration,
    identity: Identity,
}

impl Controller {
    pub fn new(
        config: &Config,
        output: Box<dyn ServoOutput>,
        store: Option<Arc<dyn BlobStore>>,
    ) -> Result<Self> {
        let mut state = State::new(config, output)?;
        if let Some(store) = &store {
            restore(&mut state, &**store);
        }
        let servo = state.servo;
        state.output.set_calibration(&servo);
        state.apply(Pose::HOME);

        info!(
            linear = state.scaling.linear(),
            angular = state.scaling.angular(),
            bits = state.bits.bits(),
            preset = state.cueing.preset().name(),
            "controller ready"
        );

        Ok(Self {
            state: Mutex::new(state),
            store,
            lock_wait: config.safety.lock_wait(),
            identity: Identity {
                device_id: config.device.id.clone(),
                platform: config.device.platform.clone(),
                firmware: crate::FIRMWARE_VERSION,
            },
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn lock(&self) -> Option<MutexGuard<'_, State>> {
        let guard = self.state.try_lock_for(self.lock_wait);
        if guard.is_none() {
            debug!("state busy, skipping");
        }
        guard
    }

    /// Act on one decoded event; returns the reply lines.
    pub fn handle(&self, event: Event, now: Instant) -> Vec<String> {
        match event {
            Event::Sample(raw) => {
                self.on_sample(&raw, now);
                Vec::new()
            }
            Event::Command(command) => self.execute(command),
            Event::Error(err) => vec![err.to_string()],
        }
    }

    /// Run one raw sample through the pipeline. Returns false when the
    /// sample was dropped on lock contention.
    pub fn on_sample(&self, raw: &RawSample, now: Instant) -> bool {
        let Some(mut state) = self.lock() else {
            return false;
        };
        let state = &mut *state;
        state.adapt_sample_rate(now);
        let target = state.scaling.map(&raw.0, state.bits.max_raw());
        let filtered = state.input_filter.process(&target);
        let cued = state.cueing.process(&filtered);
        let pose = state.supervisor.on_sample(&cued, now);
        state.apply(pose);
        true
    }

    /// Periodic activity: watchdog, homing ramp and telemetry. Returns a
    /// telemetry line when one is due.
    pub fn tick(&self, now: Instant) -> Option<String> {
        let mut state = self.lock()?;
        if let Some(pose) = state.supervisor.tick(now) {
            state.apply(pose);
        }
        if state.telemetry.due(now) {
            let last = state.last;
            Some(format_line(&last.angles, &last.pose))
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.lock().map(|state| state.last)
    }

    /// Persist calibration and cueing tuning. Blobs are encoded under the
    /// lock and written after it is released.
    pub fn save(&self) -> Result<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| anyhow!("no store configured"))?;
        let (calibration, cueing) = {
            let state = self.lock().ok_or_else(|| anyhow!("busy"))?;
            (
                encode(CALIBRATION_KEY, &state.calibration_blob())?,
                encode(CUEING_KEY, &state.cueing.to_config())?,
            )
        };
        store.save(CALIBRATION_KEY, &calibration)?;
        store.save(CUEING_KEY, &cueing)?;
        info!("configuration saved");
        Ok(())
    }
}

/// Adopt stored blobs that pass their checks; anything else is discarded
/// whole and the configured defaults stay.
fn restore(state: &mut State, store: &dyn BlobStore) {
    match load::<CalibrationBlob>(store, CALIBRATION_KEY, CALIBRATION_SCHEMA) {
        Ok(Some(blob)) => match state.restore_calibration(blob) {
            Ok(()) => info!("restored calibration"),
            Err(err) => warn!(error = %err, "discarding stored calibration"),
        },
        Ok(None) => {}
        Err(err) => warn!(error = %err, "discarding stored calibration"),
    }

    match load::<MotionCueingConfig>(store, CUEING_KEY, SCHEMA_VERSION) {
        Ok(Some(config)) => match MotionCueing::from_config(&config) {
            Ok(cueing) => {
                info!(preset = cueing.preset().name(), "restored cueing tuning");
                state.input_filter.set_sample_rate(cueing.sample_rate());
                state.cueing = cueing;
            }
            Err(err) => warn!(error = %err, "discarding stored cueing tuning"),
        },
        Ok(None) => {}
        Err(err) => warn!(error = %err, "discarding stored cueing tuning"),
    }
}

fn load<T: serde::de::DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
    schema: u32,
) -> Result<Option<T>> {
    let Some(data) = store.load(key)? else {
        return Ok(None);
    };
    Ok(Some(decode_versioned(key, &data, schema)?))
}
