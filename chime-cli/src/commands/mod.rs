//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod exec;
mod job;
mod scheduler;

pub use exec::ExecCommands;
pub use job::JobCommands;
pub use scheduler::SchedulerCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Execution history across jobs
    Exec {
        #[command(subcommand)]
        command: ExecCommands,
    },
    /// Scheduler introspection
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommands,
    },
    /// Job and execution statistics for the last 24 hours
    Stats,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Exec { command } => exec::handle_exec_command(command, config).await,
        Commands::Scheduler { command } => {
            scheduler::handle_scheduler_command(command, config).await
        }
        Commands::Stats => scheduler::show_stats(config).await,
    }
}
