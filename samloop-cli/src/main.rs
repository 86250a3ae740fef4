//! # samloop CLI
//!
//! Command-line driver for the samloop control loop. Runs YAML scripts of
//! dispatches and history moves against a built-in counter model.

mod commands;
mod model;
mod script;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "samloop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to manager configuration file (defaults apply when missing)
    #[arg(long, default_value = "samloop.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script and print the final representation and history
    Run {
        /// Script file with `steps`
        script: PathBuf,

        /// Count at which the auto-reset predicate fires
        #[arg(long, default_value_t = model::DEFAULT_RESET_THRESHOLD)]
        reset_threshold: i64,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a script and export the resulting history as JSON lines
    History {
        /// Script file with `steps`
        script: PathBuf,

        /// Count at which the auto-reset predicate fires
        #[arg(long, default_value_t = model::DEFAULT_RESET_THRESHOLD)]
        reset_threshold: i64,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            script,
            reset_threshold,
            json,
        } => commands::run_script(&cli.config, &script, reset_threshold, json),
        Commands::History {
            script,
            reset_threshold,
            out,
        } => commands::export_history(&cli.config, &script, reset_threshold, out.as_deref()),
    }
}
