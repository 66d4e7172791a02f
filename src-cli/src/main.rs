//! SynCinema CLI - Headless Shell
//!
//! Exposes the sync engine on the command line: device listing, EQ presets,
//! project export/import against the on-disk preference store, and a
//! simulated playback session for diagnosing sync behaviour.

mod commands;
mod sim;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "syncinema", version, about = "Multi-track audio sync for video playback")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// List audio output devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List built-in EQ presets
    Presets,

    /// Show which preset (if any) a set of band gains matches
    MatchPreset {
        #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
        low: f32,
        #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
        mid: f32,
        #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
        high: f32,
    },

    /// Write saved track settings and app settings to a project file
    Export {
        /// Output path (defaults to a dated file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a project file into the saved track settings
    Import { path: PathBuf },

    /// Run a simulated session and print engine events
    Simulate(sim::SimulateArgs),
}

fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("syncinema=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting SynCinema {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        CliCommand::Devices { json } => commands::list_devices(json),
        CliCommand::Presets => commands::list_presets(),
        CliCommand::MatchPreset { low, mid, high } => commands::match_preset(low, mid, high),
        CliCommand::Export { output } => commands::export_project(output),
        CliCommand::Import { path } => commands::import_project(&path),
        CliCommand::Simulate(args) => sim::run(args),
    }
}
