//! Execution command handlers

use anyhow::Result;
use chime_client::SchedulerClient;
use chime_core::domain::execution::{ExecutionStatus, ExecutionWithJob, JobExecution};
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Execution subcommands
#[derive(Subcommand)]
pub enum ExecCommands {
    /// Latest executions across all jobs
    Recent {
        #[arg(short, long)]
        limit: Option<i64>,

        /// Also show successful runs of quiet jobs
        #[arg(long)]
        include_quiet: bool,
    },
    /// Failed executions within a trailing window
    Failed {
        /// Window size in hours
        #[arg(long)]
        since_hours: Option<i64>,
    },
    /// Delete executions older than N days
    Purge {
        #[arg(long)]
        older_than_days: i64,
    },
}

pub async fn handle_exec_command(command: ExecCommands, config: &Config) -> Result<()> {
    let client = SchedulerClient::new(&config.scheduler_url);

    match command {
        ExecCommands::Recent {
            limit,
            include_quiet,
        } => {
            let executions = client.recent_executions(limit, include_quiet).await?;
            print_activity("No recent executions.", &executions);
            Ok(())
        }
        ExecCommands::Failed { since_hours } => {
            let executions = client.failed_executions(since_hours).await?;
            print_activity("No failures in this window.", &executions);
            Ok(())
        }
        ExecCommands::Purge { older_than_days } => {
            let result = client.purge_executions(older_than_days).await?;
            println!(
                "{} Deleted {} execution(s) older than {} day(s)",
                "✓".green(),
                result.deleted,
                older_than_days
            );
            Ok(())
        }
    }
}

fn print_activity(empty_message: &str, executions: &[ExecutionWithJob]) {
    if executions.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }

    println!("{}", format!("Found {} execution(s):", executions.len()).bold());
    println!("{}", "─".repeat(80).dimmed());
    for entry in executions {
        print_execution(&entry.execution, Some(&entry.job_name));
    }
    println!("{}", "─".repeat(80).dimmed());
}

/// Print one execution as a single line, with its error on the next
pub(super) fn print_execution(execution: &JobExecution, job_name: Option<&str>) {
    let status = match execution.status {
        ExecutionStatus::Success => execution.status.as_str().green(),
        ExecutionStatus::Failed => execution.status.as_str().red(),
    };
    let code = execution
        .response_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let label = job_name.unwrap_or(&execution.job_id);

    println!(
        "{} {:>7} {:>4} {:>6}ms  {}",
        execution
            .executed_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed(),
        status,
        code,
        execution.duration_ms,
        label
    );

    if let Some(error) = &execution.error_message {
        println!("    {}", error.red());
    }
}
