//! CLI for fedmon — on-device telemetry for federated-learning clients.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fedmon")]
#[command(about = "fedmon — device telemetry buffer and sync for federated-learning clients")]
#[command(version = fedmon_core::VERSION)]
struct Cli {
    /// Config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the hardware counters once and print what a sample would contain
    Probe {
        /// Write the raw snapshot as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Sample into the local store until the duration elapses or Ctrl+C
    Record {
        /// Maximum recording duration (e.g. "5m", "30s", "1h")
        #[arg(long)]
        duration: Option<String>,

        /// Sample interval (e.g. "100ms", "1s"); default from config
        #[arg(long)]
        interval: Option<String>,
    },

    /// Show what the local store currently holds
    Inspect {
        /// Print epochs and batches as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Transfer the local store to the remote database
    Sync {
        /// Client id stamped on every measurement row
        #[arg(long)]
        client_id: i32,

        /// Run the transfer against an in-memory remote and print the rows
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every record from the local store
    Purge,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Probe { output } => commands::probe::run(&config, output.as_deref()),
        Commands::Record { duration, interval } => {
            commands::record::run(config, duration.as_deref(), interval.as_deref());
        }
        Commands::Inspect { json } => commands::inspect::run(&config, json),
        Commands::Sync { client_id, dry_run } => commands::sync::run(&config, client_id, dry_run),
        Commands::Purge => commands::purge::run(&config),
    }
}
