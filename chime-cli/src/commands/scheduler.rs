//! Scheduler introspection and statistics

use anyhow::Result;
use chime_client::SchedulerClient;
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Scheduler subcommands
#[derive(Subcommand)]
pub enum SchedulerCommands {
    /// List live triggers and their next fire times
    Jobs,
    /// Check that the scheduler is reachable
    Health,
}

pub async fn handle_scheduler_command(command: SchedulerCommands, config: &Config) -> Result<()> {
    let client = SchedulerClient::new(&config.scheduler_url);

    match command {
        SchedulerCommands::Jobs => list_scheduled(&client).await,
        SchedulerCommands::Health => {
            let health = client.health().await?;
            println!("{} {}", "✓".green(), serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn list_scheduled(client: &SchedulerClient) -> Result<()> {
    let jobs = client.scheduled_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs are scheduled.".yellow());
        return Ok(());
    }

    println!("{}", format!("{} scheduled job(s):", jobs.len()).bold());
    println!();
    for job in jobs {
        let next = job
            .next_run_time
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "paused".to_string());

        println!("  {} {} ({})", "▸".cyan(), job.job_id.bold(), job.name);
        println!("    Next Run: {}", next);
        if job.running > 0 {
            println!("    Running:  {}", job.running.to_string().cyan());
        }
        println!();
    }

    Ok(())
}

/// Print job counts and the 24 hour success rate
pub async fn show_stats(config: &Config) -> Result<()> {
    let client = SchedulerClient::new(&config.scheduler_url);
    let stats = client.stats().await?;

    let rate = format!("{:.1}%", stats.success_rate_24h);
    let rate = if stats.failed_24h == 0 {
        rate.green()
    } else {
        rate.yellow()
    };

    println!("{}", "Jobs:".bold());
    println!("  Total:    {}", stats.total_jobs);
    println!("  Enabled:  {}", stats.enabled_jobs.to_string().green());
    println!("  Disabled: {}", stats.disabled_jobs.to_string().dimmed());
    println!();
    println!("{}", "Last 24 hours:".bold());
    println!("  Executions:   {}", stats.executions_24h);
    println!("  Succeeded:    {}", stats.success_24h.to_string().green());
    println!("  Failed:       {}", stats.failed_24h.to_string().red());
    println!("  Success Rate: {}", rate);

    Ok(())
}
