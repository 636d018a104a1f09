use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use stewart_core::{
    dsp::{InputFilterConfig, Preset},
    kinematics::GeometryConfig,
    scaling::{BitDepth, DEFAULT_MARGIN},
    supervisor::SlewSteps,
};
use stewart_proto::MAX_TELEMETRY_HZ;

use crate::output::ServoCalibration;

/// Main configuration for the controller runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub geometry: GeometryConfig,

    #[serde(default)]
    pub scaling: ScalingConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub cueing: CueingSettings,

    #[serde(default)]
    pub input_filter: InputFilterConfig,

    #[serde(default)]
    pub servo: ServoCalibration,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Identity reported to peers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device id, reported by `FINGERPRINT?`
    #[serde(default = "default_device_id")]
    pub id: String,

    /// Platform family, reported by `VERSION?`
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            platform: default_platform(),
        }
    }
}

/// Where samples and commands arrive from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Byte stream on stdin, replies on stdout.
    #[default]
    Stdin,
    /// Byte stream per TCP connection.
    Tcp { address: SocketAddr },
    /// Datagrams from the most recent peer; replies and telemetry go back to it.
    Udp {
        address: SocketAddr,
        #[serde(default)]
        mode: DatagramMode,
    },
}

/// How datagram contents are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatagramMode {
    /// Datagrams are consecutive chunks of the serial byte stream.
    #[default]
    Stream,
    /// Each datagram is one bare payload or one full frame, no text.
    Packet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Fraction of the searched workspace made available to the input.
    pub margin: f64,
    pub bits: BitDepth,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
            bits: BitDepth::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub slew: SlewSteps,
    pub watchdog_timeout_ms: u64,
    /// Bounded wait for the shared state lock.
    pub lock_wait_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            slew: SlewSteps::default(),
            watchdog_timeout_ms: 500,
            lock_wait_ms: 5,
        }
    }
}

impl SafetyConfig {
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Period of the watchdog/telemetry activity.
    pub tick_hz: u32,
    /// Initial telemetry rate; 0 stays silent until a peer asks.
    pub rate_hz: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tick_hz: 50,
            rate_hz: 0,
        }
    }
}

impl TelemetryConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CueingSettings {
    pub sample_rate: f64,
    pub preset: Preset,
    /// Follow the measured input rate.
    pub adaptive_sample_rate: bool,
}

impl Default for CueingSettings {
    fn default() -> Self {
        Self {
            sample_rate: 100.0,
            preset: Preset::Off,
            adaptive_sample_rate: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for persisted blobs; persistence is off when unset.
    pub dir: Option<PathBuf>,
}

fn default_device_id() -> String {
    "stewart-0".to_string()
}

fn default_platform() -> String {
    "mini-6dof".to_string()
}

impl Config {
    /// Load a controller config. `.json` is JSON, `.toml` is TOML, and
    /// anything else is tried as TOML then JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read controller config {}", path.display()))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_toml(&content).or_else(|_| Self::from_json(&content)),
        };
        config.with_context(|| format!("in controller config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("controller config is not valid TOML")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("controller config is not valid JSON")
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.id.is_empty() {
            bail!("device.id cannot be empty");
        }

        self.geometry
            .to_platform()
            .context("geometry is not a valid platform")?;

        let margin = self.scaling.margin;
        if !(margin > 0.0 && margin <= 1.0) {
            bail!("scaling.margin must be in (0, 1], got {margin}");
        }

        if !self.safety.slew.is_valid() {
            bail!("safety.slew steps must be finite and positive");
        }
        if self.safety.watchdog_timeout_ms == 0 {
            bail!("safety.watchdog_timeout_ms must be positive");
        }
        if self.safety.lock_wait_ms == 0 {
            bail!("safety.lock_wait_ms must be positive");
        }

        if !(1..=1000).contains(&self.telemetry.tick_hz) {
            bail!("telemetry.tick_hz must be in 1..=1000");
        }
        if self.telemetry.rate_hz > MAX_TELEMETRY_HZ {
            bail!("telemetry.rate_hz must be at most {MAX_TELEMETRY_HZ}");
        }

        let sr = self.cueing.sample_rate;
        if !(sr > 0.0 && sr <= stewart_core::dsp::MAX_SAMPLE_RATE) {
            bail!("cueing.sample_rate out of range: {sr}");
        }

        self.servo
            .validate()
            .context("servo calibration is out of range")?;

        if let Some(dir) = &self.store.dir {
            if dir.as_os_str().is_empty() {
                bail!("store.dir cannot be empty");
            }
        }

        Ok(())
    }
}
