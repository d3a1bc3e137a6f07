//! Chime CLI
//!
//! Command-line interface for the Chime scheduler's management API.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Chime job scheduler CLI", long_about = None)]
struct Cli {
    /// Scheduler URL
    #[arg(
        long,
        env = "CHIME_SCHEDULER_URL",
        default_value = "http://localhost:8080"
    )]
    scheduler_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        scheduler_url: cli.scheduler_url,
    };

    handle_command(cli.command, &config).await
}
