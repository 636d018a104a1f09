use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => args.run(),
        Command::Calibrate(args) => args.run(),
        Command::Solve(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "stewart", about = "Motion controller for 6DOF Stewart platforms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the controller runtime with the specified configuration.
    Start(cli::start::StartArgs),
    /// Print the workspace limits and input scaling for a geometry.
    Calibrate(cli::calibrate::CalibrateArgs),
    /// Solve one pose and print the actuator angles.
    Solve(cli::solve::SolveArgs),
}
