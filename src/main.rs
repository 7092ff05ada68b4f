//! Ripple CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ripple")]
#[command(about = "Change impact analysis between two program snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two snapshot documents and score the impact of the changes
    Compare {
        /// Snapshot document of the previous version
        previous: PathBuf,

        /// Snapshot document of the current version
        current: PathBuf,

        /// Impact configuration (defaults to ripple.toml next to the current snapshot)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of most impacted elements to list
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print statistics about a snapshot document
    Inspect {
        /// Snapshot document
        snapshot: PathBuf,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "ripple={},ripple_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Ripple v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Compare {
            previous,
            current,
            config,
            top,
            json,
        } => commands::compare(&previous, &current, config.as_deref(), top, json),
        Commands::Inspect { snapshot } => commands::inspect(&snapshot),
        Commands::Version => {
            println!("Ripple v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
