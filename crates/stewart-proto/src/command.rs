// Text command grammar
//
//   KEY?              query
//   KEY:value         mutation (KEY:sub=value for grouped settings)
//   v0,v1,...,v5      raw sample (legacy CSV path)

use stewart_core::dsp::{ChannelParam, InputParam, Preset, TiltParam};
use stewart_core::kinematics::GeometryParam;
use stewart_core::scaling::BitDepth;
use stewart_core::supervisor::SlewSteps;
use stewart_core::{AXIS_COUNT, Axis};
use thiserror::Error;

use crate::frame::Channels;

/// Servo pulse bounds in microseconds.
pub const PULSE_MIN_US: u16 = 800;
pub const PULSE_MAX_US: u16 = 2200;
/// Exclusive upper bound for the pulse-per-radian gain.
pub const MAX_PULSE_PER_RAD: f64 = 10_000.0;
pub const MAX_TELEMETRY_HZ: u32 = 50;
const MAX_SAMPLE_RATE: f64 = 100_000.0;

/// Six raw channel values before scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample(pub [f64; AXIS_COUNT]);

impl From<Channels> for RawSample {
    fn from(channels: Channels) -> Self {
        Self(channels.map(f64::from))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Version,
    Fingerprint,
    Config,
    Scale,
    Bits,
    Servo,
    Slew,
    Telemetry,
    Cueing,
    Filter,
}

impl Query {
    fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "VERSION" => Query::Version,
            "FINGERPRINT" => Query::Fingerprint,
            "CONFIG" => Query::Config,
            "SCALE" => Query::Scale,
            "BITS" => Query::Bits,
            "SERVO" => Query::Servo,
            "SLEW" => Query::Slew,
            "TELEM" => Query::Telemetry,
            "MCA" => Query::Cueing,
            "FILTER" => Query::Filter,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(Query),
    SetGeometry { param: GeometryParam, value: f64 },
    SetBits(BitDepth),
    SetServoCenter([u16; AXIS_COUNT]),
    SetServoPulse(f64),
    SetSlew(SlewSteps),
    /// Telemetry rate in Hz; 0 disables.
    SetTelemetry(u32),
    SoftStop,
    Zero,
    Save,
    CueingPreset(Preset),
    CueingReset,
    CueingSampleRate(f64),
    CueingChannel {
        axis: Axis,
        param: ChannelParam,
        value: f64,
    },
    CueingTilt { param: TiltParam, value: f64 },
    FilterEnable(bool),
    FilterChannel {
        axis: Axis,
        param: InputParam,
        value: f64,
    },
}

/// One recognised text line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Command(Command),
    Sample(RawSample),
}

/// Rejected commands. The message is the reply sent to the peer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("ERR:unknown command '{0}'")]
    Unknown(String),

    #[error("CONFIG:ERR unknown key '{0}'")]
    UnknownGeometryKey(String),

    #[error("ERR:BITS range 8-16")]
    BitsRange,

    #[error("ERR:SERVO:CENTER needs 6 comma-separated values")]
    ServoCenterArity,

    #[error("ERR:SERVO:CENTER range {PULSE_MIN_US}-{PULSE_MAX_US}")]
    ServoCenterRange,

    #[error("ERR:SERVO:PULSE out of range")]
    ServoPulseRange,

    #[error("ERR:SLEW needs <linear>,<angular> both > 0")]
    SlewRange,

    #[error("ERR:TELEM range 0-{MAX_TELEMETRY_HZ}")]
    TelemetryRange,

    #[error("MCA:ERR unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("MCA:ERR sample rate out of range")]
    SampleRate,

    #[error("{prefix}:ERR unknown axis '{axis}'")]
    UnknownAxis { prefix: &'static str, axis: String },

    #[error("{prefix}:ERR unknown param '{param}'")]
    UnknownParam { prefix: &'static str, param: String },

    #[error("{prefix}:ERR bad number '{value}'")]
    BadNumber { prefix: &'static str, value: String },

    #[error("{prefix}:ERR expected {usage}")]
    Malformed {
        prefix: &'static str,
        usage: &'static str,
    },
}

fn number(prefix: &'static str, s: &str) -> Result<f64, CommandError> {
    let s = s.trim();
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::BadNumber {
            prefix,
            value: s.to_string(),
        }),
    }
}

fn axis(prefix: &'static str, s: &str) -> Result<Axis, CommandError> {
    Axis::parse(s).ok_or_else(|| CommandError::UnknownAxis {
        prefix,
        axis: s.trim().to_string(),
    })
}

fn unknown_param(prefix: &'static str, param: &str) -> CommandError {
    CommandError::UnknownParam {
        prefix,
        param: param.trim().to_string(),
    }
}

/// `<axis>,<param>,<value>`
fn axis_triple<'a>(
    prefix: &'static str,
    args: &'a str,
) -> Result<(Axis, &'a str, f64), CommandError> {
    let mut parts = args.splitn(3, ',');
    let (Some(a), Some(p), Some(v)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CommandError::Malformed {
            prefix,
            usage: "<axis>,<param>,<value>",
        });
    };
    Ok((axis(prefix, a)?, p, number(prefix, v)?))
}

fn parse_geometry(args: &str) -> Result<Command, CommandError> {
    let Some((key, value)) = args.split_once('=') else {
        return Err(CommandError::Malformed {
            prefix: "CONFIG",
            usage: "<key>=<value>",
        });
    };
    let param =
        GeometryParam::parse(key).ok_or_else(|| CommandError::UnknownGeometryKey(key.to_string()))?;
    Ok(Command::SetGeometry {
        param,
        value: number("CONFIG", value)?,
    })
}

fn parse_servo(args: &str) -> Result<Command, CommandError> {
    if let Some(values) = args.strip_prefix("CENTER=") {
        let parsed: Vec<i64> = values
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CommandError::ServoCenterArity)?;
        let centers: [i64; AXIS_COUNT] =
            parsed.try_into().map_err(|_| CommandError::ServoCenterArity)?;
        let range = i64::from(PULSE_MIN_US)..=i64::from(PULSE_MAX_US);
        if !centers.iter().all(|c| range.contains(c)) {
            return Err(CommandError::ServoCenterRange);
        }
        // In range, so the narrowing cannot truncate
        return Ok(Command::SetServoCenter(centers.map(|c| c as u16)));
    }
    if let Some(value) = args.strip_prefix("PULSE=") {
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|_| CommandError::ServoPulseRange)?;
        if !(value > 0.0 && value < MAX_PULSE_PER_RAD) {
            return Err(CommandError::ServoPulseRange);
        }
        return Ok(Command::SetServoPulse(value));
    }
    let param = args.split_once('=').map_or(args, |(k, _)| k);
    Err(unknown_param("SERVO", param))
}

fn parse_slew(args: &str) -> Result<Command, CommandError> {
    let (linear, angular) = args.split_once(',').ok_or(CommandError::SlewRange)?;
    let parse = |s: &str| s.trim().parse::<f64>().map_err(|_| CommandError::SlewRange);
    let steps = SlewSteps::new(parse(linear)?, parse(angular)?);
    if !steps.is_valid() {
        return Err(CommandError::SlewRange);
    }
    Ok(Command::SetSlew(steps))
}

fn parse_cueing(args: &str) -> Result<Command, CommandError> {
    const P: &str = "MCA";
    if args == "RESET" {
        return Ok(Command::CueingReset);
    }
    let Some((key, value)) = args.split_once('=') else {
        return Err(unknown_param(P, args));
    };
    match key {
        "PRESET" => Preset::parse(value)
            .map(Command::CueingPreset)
            .ok_or_else(|| CommandError::UnknownPreset(value.trim().to_string())),
        "SR" => {
            let rate = number(P, value)?;
            if rate > 0.0 && rate <= MAX_SAMPLE_RATE {
                Ok(Command::CueingSampleRate(rate))
            } else {
                Err(CommandError::SampleRate)
            }
        }
        "CH" => {
            let (axis, param, value) = axis_triple(P, value)?;
            let param = ChannelParam::parse(param).ok_or_else(|| unknown_param(P, param))?;
            Ok(Command::CueingChannel { axis, param, value })
        }
        "TILT" => {
            let Some((param, value)) = value.split_once(',') else {
                return Err(CommandError::Malformed {
                    prefix: P,
                    usage: "<param>,<value>",
                });
            };
            let param = TiltParam::parse(param).ok_or_else(|| unknown_param(P, param))?;
            Ok(Command::CueingTilt {
                param,
                value: number(P, value)?,
            })
        }
        other => Err(unknown_param(P, other)),
    }
}

fn parse_filter(args: &str) -> Result<Command, CommandError> {
    const P: &str = "FILTER";
    match args {
        "ON" => return Ok(Command::FilterEnable(true)),
        "OFF" => return Ok(Command::FilterEnable(false)),
        _ => {}
    }
    let Some(value) = args.strip_prefix("CH=") else {
        let param = args.split_once('=').map_or(args, |(k, _)| k);
        return Err(unknown_param(P, param));
    };
    let (axis, param, value) = axis_triple(P, value)?;
    let param = InputParam::parse(param).ok_or_else(|| unknown_param(P, param))?;
    Ok(Command::FilterChannel { axis, param, value })
}

fn parse_sample(line: &str) -> Option<RawSample> {
    let mut values = [0.0; AXIS_COUNT];
    let mut count = 0;
    for token in line.split(',') {
        if count == AXIS_COUNT {
            return None;
        }
        let v = token.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        values[count] = v;
        count += 1;
    }
    (count == AXIS_COUNT).then_some(RawSample(values))
}

/// Parse one terminated text line.
///
/// `Ok(None)` means the line is neither a command nor a six-value sample
/// and is ignored.
pub fn parse_line(line: &str) -> Result<Option<Line>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let command = match line {
        "ESTOP:SOFT" => Some(Command::SoftStop),
        "ZERO" => Some(Command::Zero),
        "SAVE" => Some(Command::Save),
        _ => None,
    };
    if let Some(command) = command {
        return Ok(Some(Line::Command(command)));
    }

    if let Some(key) = line.strip_suffix('?') {
        return Query::parse(key)
            .map(|q| Some(Line::Command(Command::Query(q))))
            .ok_or_else(|| CommandError::Unknown(key.to_string()));
    }

    if let Some((key, args)) = line.split_once(':') {
        let command = match key {
            "CONFIG" => parse_geometry(args)?,
            "BITS" => {
                let bits = args.trim().parse::<u8>().map_err(|_| CommandError::BitsRange)?;
                Command::SetBits(BitDepth::new(bits).map_err(|_| CommandError::BitsRange)?)
            }
            "SERVO" => parse_servo(args)?,
            "SLEW" => parse_slew(args)?,
            "TELEM" => {
                let hz = args
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| CommandError::TelemetryRange)?;
                if hz > MAX_TELEMETRY_HZ {
                    return Err(CommandError::TelemetryRange);
                }
                Command::SetTelemetry(hz)
            }
            "MCA" => parse_cueing(args)?,
            "FILTER" => parse_filter(args)?,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        return Ok(Some(Line::Command(command)));
    }

    Ok(parse_sample(line).map(Line::Sample))
}
