use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use stewart::config::Config;
use stewart_core::{
    Axis,
    scaling::{AxisScaling, search_limits},
};

#[derive(Args)]
pub struct CalibrateArgs {
    /// Path to the configuration file (TOML or JSON).
    pub config: PathBuf,

    /// Override the configured scaling margin.
    #[arg(long)]
    pub margin: Option<f64>,
}

impl CalibrateArgs {
    pub fn run(&self) -> Result<()> {
        let mut config = Config::from_file(&self.config)?;
        if let Some(margin) = self.margin {
            config.scaling.margin = margin;
        }
        config.validate()?;

        let geometry = config
            .geometry
            .to_platform()
            .context("geometry is not a valid platform")?;
        let limits = search_limits(&geometry);
        let scaling = AxisScaling::from_limits(&limits, config.scaling.margin);

        println!("axis    limit      scale");
        for axis in Axis::ALL {
            let unit = if axis.is_angular() { "deg" } else { "" };
            println!(
                "{:<6} {:>8.3}{unit:<3} {:>6.1}",
                axis.name(),
                limits[axis.index()],
                scaling.scale[axis.index()],
            );
        }
        println!(
            "SCALE: linear={:.1} angular={:.1} (margin {:.2})",
            scaling.linear(),
            scaling.angular(),
            config.scaling.margin
        );

        Ok(())
    }
}
