//! Retouch Application
//!
//! Command-line driver for the edit pipeline.
//!
//! Commands:
//! - `schedule`: print the edit decision for a range of steps
//! - `simulate`: run the full pipeline against synthetic collaborators
//! - `trajectories`: track a synthetic moving pattern and write an overlay

mod app;
mod sim;

use clap::Parser;
use std::path::PathBuf;

use crate::app::{AppBuilder, Command, LoggingConfig};

/// Retouch - instruction-driven scene editing
#[derive(Parser, Debug)]
#[command(name = "retouch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON edit config; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let args = Args::parse();

    let mut builder = AppBuilder::new().with_logging(LoggingConfig {
        level: args.log_level,
    });
    if let Some(path) = args.config {
        builder = builder.with_config_path(path);
    }

    if let Err(e) = builder.run(args.command) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
