use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use stewart::config::Config;
use stewart_core::{Pose, kinematics::solve_checked};

#[derive(Args)]
pub struct SolveArgs {
    /// Path to the configuration file (TOML or JSON).
    pub config: PathBuf,

    /// Surge, sway, heave, then roll, pitch, yaw in degrees.
    #[arg(
        num_args = 6,
        allow_negative_numbers = true,
        value_names = ["SURGE", "SWAY", "HEAVE", "ROLL", "PITCH", "YAW"]
    )]
    pub pose: Vec<f64>,
}

impl SolveArgs {
    pub fn run(&self) -> Result<()> {
        let config = Config::from_file(&self.config)?;
        config.validate()?;

        let Ok(values) = <[f64; 6]>::try_from(self.pose.as_slice()) else {
            bail!("expected six pose values, got {}", self.pose.len());
        };
        let pose = Pose::new([
            values[0],
            values[1],
            values[2],
            values[3].to_radians(),
            values[4].to_radians(),
            values[5].to_radians(),
        ]);

        let geometry = config
            .geometry
            .to_platform()
            .context("geometry is not a valid platform")?;
        let (angles, mask) = solve_checked(&pose, &geometry);
        let servo = &config.servo;

        for (k, angle) in angles.iter().enumerate() {
            let flag = if mask.contains(k) { "  LIMIT" } else { "" };
            println!(
                "actuator {k}: {:>8.3} deg {:>9.5} rad {:>5} us{flag}",
                angle.to_degrees(),
                angle,
                servo.pulse(k, angle),
            );
        }
        println!("validity mask: {mask}");

        Ok(())
    }
}
