// Text command execution and reply formatting

use std::fmt::Write as _;
use stewart_core::{
    AXIS_COUNT, Axis, Pose,
    dsp::{ChannelParam, InputParam, ParamError, TiltParam},
    kinematics::{GeometryConfig, GeometryParam},
};
use stewart_proto::{Command, PROTOCOL_VERSION, Query};
use tracing::info;

use super::{Controller, Identity, State};

const BUSY: &str = "ERR:busy";

fn flag(on: bool) -> u8 {
    u8::from(on)
}

fn csv<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    let mut out = String::new();
    for (i, v) in values.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{v}");
    }
    out
}

impl Controller {
    pub(super) fn execute(&self, command: Command) -> Vec<String> {
        if command == Command::Save {
            return vec![match self.save() {
                Ok(()) => "SAVE:OK".to_string(),
                Err(err) => format!("SAVE:ERR {err}"),
            }];
        }
        let Some(mut state) = self.lock() else {
            return vec![BUSY.to_string()];
        };
        state.execute(&self.identity, command)
    }
}

impl State {
    fn execute(&mut self, identity: &Identity, command: Command) -> Vec<String> {
        let reply = match command {
            Command::Query(query) => return self.query(identity, query),
            Command::SetGeometry { param, value } => self.set_geometry_param(param, value),
            Command::SetBits(bits) => {
                self.bits = bits;
                self.bits_line()
            }
            Command::SetServoCenter(center) => {
                let mut servo = self.servo;
                servo.center = center;
                self.set_servo(servo);
                format!("SERVO:CENTER={}", csv(center))
            }
            Command::SetServoPulse(pulse_per_rad) => {
                let mut servo = self.servo;
                servo.pulse_per_rad = pulse_per_rad;
                self.set_servo(servo);
                format!("SERVO:PULSE={pulse_per_rad:.1}")
            }
            Command::SetSlew(steps) => {
                self.supervisor.set_steps(steps);
                self.slew_line()
            }
            Command::SetTelemetry(hz) => {
                self.telemetry.set_rate(hz);
                self.telemetry_line()
            }
            Command::SoftStop => {
                let pose = self.supervisor.soft_stop();
                self.apply(pose);
                info!("soft stop");
                "ESTOP:SOFT Servos homing to center".to_string()
            }
            Command::Zero => {
                self.supervisor.hard_home();
                self.cueing.reset();
                self.input_filter.reset();
                self.apply(Pose::HOME);
                "ZERO:OK All servos at center".to_string()
            }
            // Saved by the controller once the lock is released
            Command::Save => "SAVE:ERR busy".to_string(),
            Command::CueingPreset(preset) => {
                self.cueing.apply_preset(preset);
                format!("MCA:OK preset={}", preset.name())
            }
            Command::CueingReset => {
                self.cueing.reset();
                "MCA:OK reset".to_string()
            }
            Command::CueingSampleRate(sample_rate) => {
                self.cueing.set_sample_rate(sample_rate);
                self.input_filter.set_sample_rate(sample_rate);
                format!("MCA:OK sr={:.1}", self.cueing.sample_rate())
            }
            Command::CueingChannel { axis, param, value } => param_reply(
                "MCA",
                format_args!("{} {}", axis.name(), param.key()),
                value,
                self.cueing.set_channel_param(axis, param, value),
            ),
            Command::CueingTilt { param, value } => param_reply(
                "MCA",
                format_args!("TILT {}", param.key()),
                value,
                self.cueing.set_tilt_param(param, value),
            ),
            Command::FilterEnable(enabled) => {
                self.input_filter.set_enabled(enabled);
                format!("FILTER:OK enabled={}", flag(enabled))
            }
            Command::FilterChannel { axis, param, value } => param_reply(
                "FILTER",
                format_args!("{} {}", axis.name(), param.key()),
                value,
                self.input_filter.set_param(axis, param, value),
            ),
        };
        vec![reply]
    }

    fn set_geometry_param(&mut self, param: GeometryParam, value: f64) -> String {
        let Some(compact) = self.geometry_config.as_compact() else {
            return "CONFIG:ERR geometry is generalized".to_string();
        };
        let mut compact = *compact;
        compact.set(param, value);
        let config = GeometryConfig::Compact(compact);
        match config.to_platform() {
            Ok(geometry) => {
                self.set_geometry(config, geometry);
                format!("CONFIG:OK {}={value:.4} (scales recomputed)", param.key())
            }
            Err(err) => format!("CONFIG:ERR {err}"),
        }
    }

    fn query(&self, identity: &Identity, query: Query) -> Vec<String> {
        match query {
            Query::Version => vec![format!(
                "VERSION:{},proto={PROTOCOL_VERSION},platform={}",
                identity.firmware, identity.platform
            )],
            Query::Fingerprint => vec![format!(
                "FINGERPRINT:{},fw={},proto={PROTOCOL_VERSION},platform={}",
                identity.device_id, identity.firmware, identity.platform
            )],
            Query::Config => vec![self.geometry_line(), self.servo_line()],
            Query::Scale => vec![format!(
                "SCALE:{}",
                csv(self.scaling.scale.iter().map(|s| format!("{s:.2}")))
            )],
            Query::Bits => vec![self.bits_line()],
            Query::Servo => vec![self.servo_line()],
            Query::Slew => vec![self.slew_line()],
            Query::Telemetry => vec![self.telemetry_line()],
            Query::Cueing => self.cueing_lines(),
            Query::Filter => self.filter_lines(),
        }
    }

    fn geometry_line(&self) -> String {
        match &self.geometry_config {
            GeometryConfig::Compact(c) => {
                let mut line = String::from("CONFIG:");
                for (i, param) in GeometryParam::ALL.into_iter().enumerate() {
                    if i > 0 {
                        line.push(',');
                    }
                    let _ = write!(line, "{}={:.2}", param.key(), c.get(param));
                }
                line
            }
            GeometryConfig::Generalized(g) => format!(
                "CONFIG:generalized,height={:.2},servo_min={:.2},servo_max={:.2}",
                g.home_height,
                g.servo_min.to_degrees(),
                g.servo_max.to_degrees()
            ),
        }
    }

    fn servo_line(&self) -> String {
        format!(
            "SERVO:center={},pulse_per_rad={:.1}",
            csv(self.servo.center),
            self.servo.pulse_per_rad
        )
    }

    fn bits_line(&self) -> String {
        format!("BITS:{},max_raw={}", self.bits.bits(), self.bits.max_raw())
    }

    fn slew_line(&self) -> String {
        let steps = self.supervisor.steps();
        format!(
            "SLEW:linear={:.3},angular={:.3}",
            steps.linear, steps.angular
        )
    }

    fn telemetry_line(&self) -> String {
        format!("TELEM:rate={}", self.telemetry.rate_hz())
    }

    fn cueing_lines(&self) -> Vec<String> {
        let cueing = &self.cueing;
        let mut lines = Vec::with_capacity(AXIS_COUNT + 2);
        lines.push(format!(
            "MCA:enabled={},preset={},sr={:.1}",
            flag(cueing.enabled()),
            cueing.preset().name(),
            cueing.sample_rate()
        ));
        for axis in Axis::ALL {
            let ch = cueing.channel(axis).to_config();
            let rate = ch
                .rate_limit
                .map_or_else(|| "off".to_string(), |r| format!("{r:.3}"));
            lines.push(format!(
                "MCA:CH={},{}={},{}={:.3},{}={:.3},{}={},{}={:.3},{}={:.3},{}={:.3},{}={rate}",
                axis.name(),
                ChannelParam::WashoutEnabled.key(),
                flag(ch.washout.enabled),
                ChannelParam::WashoutCutoff.key(),
                ch.washout.cutoff,
                ChannelParam::WashoutQ.key(),
                ch.washout.q,
                ChannelParam::SmoothingEnabled.key(),
                flag(ch.smoothing.enabled),
                ChannelParam::SmoothingCutoff.key(),
                ch.smoothing.cutoff,
                ChannelParam::SmoothingQ.key(),
                ch.smoothing.q,
                ChannelParam::Gain.key(),
                ch.gain,
                ChannelParam::RateLimit.key(),
            ));
        }
        let tilt = cueing.tilt().to_config();
        lines.push(format!(
            "MCA:TILT={}={},{}={:.3},{}={:.3},{}={:.3},{}={:.3}",
            TiltParam::Enabled.key(),
            flag(tilt.enabled),
            TiltParam::SurgeGain.key(),
            tilt.surge_gain,
            TiltParam::SwayGain.key(),
            tilt.sway_gain,
            TiltParam::Cutoff.key(),
            tilt.cutoff,
            TiltParam::Q.key(),
            tilt.q,
        ));
        lines
    }

    fn filter_lines(&self) -> Vec<String> {
        let filter = &self.input_filter;
        let config = filter.to_config();
        let mut lines = Vec::with_capacity(AXIS_COUNT + 1);
        lines.push(format!(
            "FILTER:enabled={},sr={:.1}",
            flag(filter.enabled()),
            filter.sample_rate()
        ));
        for axis in Axis::ALL {
            let ax = &config.axes[axis.index()];
            lines.push(format!(
                "FILTER:CH={},{}={},{}={:.3},{}={:.3},{}={},{}={:.3},{}={:.3}",
                axis.name(),
                InputParam::LowpassEnabled.key(),
                flag(ax.lowpass.enabled),
                InputParam::LowpassCutoff.key(),
                ax.lowpass.cutoff,
                InputParam::LowpassQ.key(),
                ax.lowpass.q,
                InputParam::NotchEnabled.key(),
                flag(ax.notch.enabled),
                InputParam::NotchCutoff.key(),
                ax.notch.cutoff,
                InputParam::NotchQ.key(),
                ax.notch.q,
            ));
        }
        lines
    }
}

fn param_reply(
    prefix: &str,
    target: std::fmt::Arguments<'_>,
    value: f64,
    result: Result<(), ParamError>,
) -> String {
    match result {
        Ok(()) => format!("{prefix}:OK {target}={value:.4}"),
        Err(err) => format!("{prefix}:ERR {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, output::RecordingOutput};
    use std::time::Instant;
    use stewart_proto::{StreamDecoder, parse_line};

    fn controller() -> Controller {
        Controller::new(&Config::default(), Box::new(RecordingOutput::new()), None).unwrap()
    }

    fn send(controller: &Controller, line: &str) -> Vec<String> {
        let mut decoder = StreamDecoder::new();
        let mut input = line.as_bytes().to_vec();
        input.push(b'\n');
        decoder
            .feed(&input)
            .flat_map(|event| controller.handle(event, Instant::now()))
            .collect()
    }

    #[test]
    fn identity_queries() {
        let c = controller();
        let version = format!("VERSION:{},proto=1,platform=mini-6dof", crate::FIRMWARE_VERSION);
        assert_eq!(send(&c, "VERSION?"), vec![version]);
        assert_eq!(
            send(&c, "FINGERPRINT?")[0],
            format!("FINGERPRINT:stewart-0,fw={},proto=1,platform=mini-6dof", crate::FIRMWARE_VERSION)
        );
    }

    #[test]
    fn geometry_query_and_set() {
        let c = controller();
        assert_eq!(
            send(&c, "CONFIG?"),
            vec![
                "CONFIG:RD=15.75,PD=16.00,L1=7.25,L2=28.50,height=25.52,theta_r=10.00,theta_p=30.00",
                "SERVO:center=1500,1500,1500,1500,1500,1500,pulse_per_rad=1018.6",
            ]
        );
        assert_eq!(
            send(&c, "SCALE?"),
            vec!["SCALE:4.00,4.00,4.00,15.00,15.00,15.00"]
        );
        assert_eq!(
            send(&c, "CONFIG:L1=7.5"),
            vec!["CONFIG:OK L1=7.5000 (scales recomputed)"]
        );
        assert_eq!(send(&c, "CONFIG:XX=1"), vec!["CONFIG:ERR unknown key 'XX'"]);
        assert!(send(&c, "CONFIG:L2=-3")[0].starts_with("CONFIG:ERR "));
        assert!(send(&c, "CONFIG?")[0].contains("L1=7.50,L2=28.50"));
    }

    #[test]
    fn bits_and_servo() {
        let c = controller();
        assert_eq!(send(&c, "BITS?"), vec!["BITS:12,max_raw=4095"]);
        assert_eq!(send(&c, "BITS:16"), vec!["BITS:16,max_raw=65535"]);
        assert_eq!(send(&c, "BITS:4"), vec!["ERR:BITS range 8-16"]);
        assert_eq!(send(&c, "BITS?"), vec!["BITS:16,max_raw=65535"]);

        assert_eq!(
            send(&c, "SERVO:CENTER=1500,1510,1490,1500,1500,1500"),
            vec!["SERVO:CENTER=1500,1510,1490,1500,1500,1500"]
        );
        assert_eq!(send(&c, "SERVO:PULSE=900"), vec!["SERVO:PULSE=900.0"]);
        assert_eq!(
            send(&c, "SERVO?"),
            vec!["SERVO:center=1500,1510,1490,1500,1500,1500,pulse_per_rad=900.0"]
        );
    }

    #[test]
    fn slew_and_telemetry() {
        let c = controller();
        assert_eq!(send(&c, "SLEW?"), vec!["SLEW:linear=0.500,angular=0.050"]);
        assert_eq!(send(&c, "SLEW:1,0.1"), vec!["SLEW:linear=1.000,angular=0.100"]);
        assert_eq!(send(&c, "TELEM?"), vec!["TELEM:rate=0"]);
        assert_eq!(send(&c, "TELEM:20"), vec!["TELEM:rate=20"]);
        assert!(c.tick(Instant::now()).unwrap().starts_with("TELEM:"));
    }

    #[test]
    fn cueing_commands() {
        let c = controller();
        assert_eq!(send(&c, "MCA:PRESET=gentle"), vec!["MCA:OK preset=gentle"]);
        let lines = send(&c, "MCA?");
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("MCA:enabled=1,preset=gentle,sr=100.0"));
        assert_eq!(
            send(&c, "MCA:CH=yaw,gain,0.5"),
            vec!["MCA:OK yaw GAIN=0.5000"]
        );
        assert!(send(&c, "MCA?")[6].contains("GAIN=0.500"));
        assert_eq!(
            send(&c, "MCA:CH=yaw,hp_q,0"),
            vec!["MCA:ERR Q out of range 0..100"]
        );
        assert_eq!(send(&c, "MCA:TILT=fc,0.8"), vec!["MCA:OK TILT FC=0.8000"]);
        assert_eq!(send(&c, "MCA:SR=60"), vec!["MCA:OK sr=60.0"]);
        assert_eq!(send(&c, "MCA:RESET"), vec!["MCA:OK reset"]);
    }

    #[test]
    fn input_filter_commands() {
        let c = controller();
        assert_eq!(send(&c, "FILTER:ON"), vec!["FILTER:OK enabled=1"]);
        assert_eq!(
            send(&c, "FILTER:CH=heave,notch_fc,12"),
            vec!["FILTER:OK heave NOTCH_FC=12.0000"]
        );
        let lines = send(&c, "FILTER?");
        assert_eq!(lines[0], "FILTER:enabled=1,sr=100.0");
        assert!(lines[3].starts_with("FILTER:CH=heave,"));
        assert!(lines[3].contains("NOTCH_FC=12.000"));
    }

    #[test]
    fn save_without_store() {
        let c = controller();
        assert_eq!(send(&c, "SAVE"), vec!["SAVE:ERR no store configured"]);
    }

    #[test]
    fn unknown_and_ignored() {
        let c = controller();
        assert_eq!(send(&c, "NOPE?"), vec!["ERR:unknown command 'NOPE'"]);
        assert!(send(&c, "hello").is_empty());
        assert_eq!(parse_line("ZERO"), Ok(Some(stewart_proto::Line::Command(Command::Zero))));
        assert_eq!(send(&c, "ZERO"), vec!["ZERO:OK All servos at center"]);
    }
}
