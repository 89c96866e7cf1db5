//! ## larm-cli
//! **Host-side tooling for the alert agent**
//! Runs a simulated hard fault through the reference ports, decodes
//! captured serial dumps and drains alert storage directories.
//!
//! ### Expectations:
//! - Configuration comes from `--config` or the default figment hierarchy
//! - Serial dumps go to stdout so they can be captured and decoded later

use anyhow::Context;
use clap::Parser;
use larm_config::LarmConfig;
use larm_telemetry::logging::EventLogger;
use larm_telemetry::metrics::MetricsRecorder;

mod commands;
mod report;

use commands::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LarmConfig::load_from_path(path),
        None => LarmConfig::load(),
    }
    .context("Failed to load configuration")?;

    EventLogger::init_with_level(&config.telemetry.log_level);
    let metrics = if config.telemetry.metrics {
        Some(MetricsRecorder::new().context("Failed to register metrics")?)
    } else {
        None
    };

    match cli.command {
        Commands::Simulate(args) => commands::simulate(&config, args, metrics),
        Commands::Decode(args) => commands::decode(&config, args),
        Commands::Drain(args) => commands::drain(&config, args, metrics),
    }
}
