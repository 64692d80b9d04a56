//! Administrative CLI for warden
//!
//! Device trust administration (`warden devices ...`) and access decision
//! tooling (`warden access ...`). Decisions print to stdout and exit
//! zero whether they permit or deny; operational errors print one line
//! to stderr and exit non-zero.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod context;
mod durations;
mod host;

use commands::{handle_access_command, handle_devices_command, AccessCommand, DevicesCommand};
use config::Config;
use context::AppContext;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Device trust and access decision administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "warden.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Device trust administration
    #[command(subcommand)]
    Devices(DevicesCommand),

    /// Access decision evaluation
    #[command(subcommand)]
    Access(AccessCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;
    tracing::debug!(
        config = %cli.config.display(),
        cluster = %config.cluster_name,
        "configuration loaded"
    );
    let ctx = AppContext::from_config(&config)?;

    match cli.command {
        Commands::Devices(cmd) => handle_devices_command(cmd, &ctx).await,
        Commands::Access(cmd) => handle_access_command(cmd, &ctx).await,
    }
}
