//! Headless command-line harness for the Cellblock field simulation.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cellblock",
    about = "Cellblock: lay out, replay and inspect replicated cube fields",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a field and print its starting blocks
    Layout {
        /// Shared seed for block placement
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Cells along each axis
        #[arg(short, long, default_value = "9")]
        width: u32,

        /// Blocks placed in each plane along x
        #[arg(short, long, default_value = "3")]
        per_plane: u32,
    },

    /// Apply a JSON script of intents and print the committed events
    Replay {
        /// Path to a JSON array of intents
        script: PathBuf,

        /// Shared seed for block placement
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Cells along each axis
        #[arg(short, long, default_value = "9")]
        width: u32,

        /// Also print rejected intents
        #[arg(short, long)]
        verbose: bool,

        /// Write the final session snapshot to this file
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Load a session snapshot and print its roster and blocks
    Inspect {
        /// Path to a snapshot written by `replay --snapshot`
        snapshot: PathBuf,

        /// Show one cell and the blocks it would consolidate with
        #[arg(short, long)]
        index: Option<u32>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Layout {
            seed,
            width,
            per_plane,
        } => commands::layout::run(seed, width, per_plane),
        Commands::Replay {
            script,
            seed,
            width,
            verbose,
            snapshot,
        } => commands::replay::run(&script, seed, width, verbose, snapshot.as_deref()),
        Commands::Inspect { snapshot, index } => commands::inspect::run(&snapshot, index),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
