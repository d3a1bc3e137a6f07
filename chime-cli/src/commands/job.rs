//! Job command handlers
//!
//! Handles job definitions and their triggers: listing, viewing,
//! creating from JSON files, enabling, disabling and manual runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chime_client::SchedulerClient;
use chime_core::domain::job::Job;
use chime_core::domain::schedule::Schedule;
use chime_core::dto::job::{CreateJob, UpdateJob};
use clap::Subcommand;
use colored::*;

use super::exec::print_execution;
use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List jobs
    List {
        /// Include disabled jobs
        #[arg(short, long)]
        all: bool,
    },
    /// Get job details
    Get {
        /// Job ID
        id: String,
    },
    /// Create a job from a JSON definition
    Create {
        /// Path to the job definition
        file: PathBuf,
    },
    /// Apply a partial update from a JSON file
    Update {
        /// Job ID
        id: String,

        /// Path to the changes
        file: PathBuf,
    },
    /// Delete a job and its history
    Delete {
        /// Job ID
        id: String,
    },
    /// Enable a job
    Enable {
        /// Job ID
        id: String,
    },
    /// Disable a job
    Disable {
        /// Job ID
        id: String,
    },
    /// Fire a job immediately
    Run {
        /// Job ID
        id: String,
    },
    /// Show the next scheduled fire time
    Next {
        /// Job ID
        id: String,
    },
    /// Show execution history
    History {
        /// Job ID
        id: String,

        #[arg(short, long)]
        limit: Option<i64>,

        #[arg(short, long)]
        offset: Option<i64>,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = SchedulerClient::new(&config.scheduler_url);

    match command {
        JobCommands::List { all } => list_jobs(&client, all).await,
        JobCommands::Get { id } => get_job(&client, &id).await,
        JobCommands::Create { file } => create_job(&client, &file).await,
        JobCommands::Update { id, file } => update_job(&client, &id, &file).await,
        JobCommands::Delete { id } => delete_job(&client, &id).await,
        JobCommands::Enable { id } => {
            let job = client.enable_job(&id).await?;
            println!("{} Job {} enabled", "✓".green(), job.job_id.cyan());
            Ok(())
        }
        JobCommands::Disable { id } => {
            let job = client.disable_job(&id).await?;
            println!("{} Job {} disabled", "✓".green(), job.job_id.cyan());
            Ok(())
        }
        JobCommands::Run { id } => run_job(&client, &id).await,
        JobCommands::Next { id } => next_run(&client, &id).await,
        JobCommands::History { id, limit, offset } => {
            job_history(&client, &id, limit, offset).await
        }
    }
}

async fn list_jobs(client: &SchedulerClient, include_disabled: bool) -> Result<()> {
    let jobs = client.list_jobs(include_disabled).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn get_job(client: &SchedulerClient, id: &str) -> Result<()> {
    let job = client.get_job(id).await?;
    print_job_details(&job);

    let next = client.next_run(id).await?;
    match next.next_run_time {
        Some(at) => println!("  Next Run:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Next Run:    {}", "not scheduled".dimmed()),
    }

    Ok(())
}

async fn create_job(client: &SchedulerClient, file: &Path) -> Result<()> {
    let req: CreateJob = read_json(file)?;
    let job = client.create_job(&req).await?;

    println!("{} Job created", "✓".green());
    print_job_details(&job);

    Ok(())
}

async fn update_job(client: &SchedulerClient, id: &str, file: &Path) -> Result<()> {
    let changes: UpdateJob = read_json(file)?;
    let job = client.update_job(id, &changes).await?;

    println!("{} Job updated", "✓".green());
    print_job_details(&job);

    Ok(())
}

async fn delete_job(client: &SchedulerClient, id: &str) -> Result<()> {
    client.delete_job(id).await?;
    println!("{} Job {} deleted", "✓".green(), id.cyan());
    Ok(())
}

async fn run_job(client: &SchedulerClient, id: &str) -> Result<()> {
    let ack = client.run_job(id).await?;

    println!("{} Job {} queued", "✓".green(), ack.job_id.cyan());
    println!("  Run ID: {}", ack.run_id.dimmed());
    println!(
        "{}",
        format!("  Check the outcome with: chime job history {}", ack.job_id).dimmed()
    );

    Ok(())
}

async fn next_run(client: &SchedulerClient, id: &str) -> Result<()> {
    let next = client.next_run(id).await?;

    match next.next_run_time {
        Some(at) => println!("{}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("{}", "Job is not scheduled.".yellow()),
    }

    Ok(())
}

async fn job_history(
    client: &SchedulerClient,
    id: &str,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<()> {
    let executions = client.job_history(id, limit, offset).await?;

    if executions.is_empty() {
        println!("{}", format!("No executions recorded for {}.", id).yellow());
        return Ok(());
    }

    println!("{}", format!("History for job {}:", id).bold());
    println!("{}", "─".repeat(80).dimmed());
    for execution in &executions {
        print_execution(execution, None);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", file.display()))
}

/// One-line rendering of a schedule
fn describe_schedule(schedule: &Schedule) -> String {
    match schedule {
        Schedule::Cron(cron) => {
            let fields = [
                ("year", &cron.year),
                ("month", &cron.month),
                ("day", &cron.day),
                ("week", &cron.week),
                ("day_of_week", &cron.day_of_week),
                ("hour", &cron.hour),
                ("minute", &cron.minute),
                ("second", &cron.second),
            ];
            let parts: Vec<String> = fields
                .iter()
                .filter_map(|(name, value)| value.as_ref().map(|v| format!("{}={}", name, v)))
                .collect();
            format!("cron {}", parts.join(" "))
        }
        Schedule::Interval(interval) => format!("every {}s", interval.total_seconds()),
    }
}

fn print_job_summary(job: &Job) {
    let state = if job.enabled {
        "enabled".green()
    } else {
        "disabled".dimmed()
    };

    println!("  {} {} ({})", "▸".cyan(), job.job_id.bold(), job.name);
    println!("    Target:   {} {}{}", job.method, job.target_bot, job.endpoint);
    println!("    Schedule: {}", describe_schedule(&job.schedule).dimmed());
    println!("    State:    {}", state);
    println!();
}

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.job_id.cyan());
    println!("  Name:        {}", job.name);
    if let Some(description) = &job.description {
        println!("  Description: {}", description);
    }
    println!("  Target:      {} {}{}", job.method, job.target_bot, job.endpoint);
    println!("  Schedule:    {}", describe_schedule(&job.schedule));
    println!(
        "  Enabled:     {}",
        if job.enabled { "✓".green() } else { "✗".red() }
    );
    if job.quiet {
        println!("  Quiet:       {}", "yes".dimmed());
    }
    println!("  Created By:  {}", job.created_by);
    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(last_run) = job.last_run {
        println!("  Last Run:    {}", last_run.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(last_success) = job.last_success {
        println!("  Last OK:     {}", last_success.format("%Y-%m-%d %H:%M:%S"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::domain::schedule::{CronSchedule, IntervalSchedule};

    #[test]
    fn test_describe_cron_lists_set_fields() {
        let schedule = Schedule::Cron(CronSchedule {
            day_of_week: Some("mon-fri".into()),
            hour: Some("3".into()),
            ..Default::default()
        });
        assert_eq!(describe_schedule(&schedule), "cron day_of_week=mon-fri hour=3");
    }

    #[test]
    fn test_describe_interval() {
        let schedule = Schedule::Interval(IntervalSchedule {
            minutes: 5,
            ..Default::default()
        });
        assert_eq!(describe_schedule(&schedule), "every 300s");
    }
}
