//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod report;

pub use job::JobCommands;
pub use report::ReportCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tally_core::domain::execution::{ExecutionStatus, JobExecution};

use crate::api::ApiClient;
use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Report file tools
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Check that the orchestrator is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Report { command } => report::handle_report_command(command).await,
        Commands::Health => health(config).await,
    }
}

async fn health(config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url, None);
    let status = client.health().await?;
    println!(
        "{} {} ({})",
        "✓".green(),
        client.base_url(),
        status["status"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

/// Print the outcome of a finished execution
pub(crate) fn print_execution(execution: &JobExecution) {
    println!("{}", "Job Execution:".bold());
    println!("  ID:         {}", execution.id.to_string().cyan());
    println!("  Job:        {}", execution.job_name);
    println!("  Parameters: {}", execution.parameters);
    println!("  Status:     {}", colorize_status(execution.status));

    if let (Some(started), Some(ended)) = (execution.start_time, execution.end_time) {
        let duration = ended.signed_duration_since(started);
        println!("  Duration:   {}ms", duration.num_milliseconds());
    }

    if !execution.step_executions.is_empty() {
        println!("\n{}", "Steps:".bold());
        for step in &execution.step_executions {
            println!(
                "  {} [{}] {}",
                step.step_name.cyan(),
                step.kind.as_str().dimmed(),
                colorize_status(step.status)
            );
            println!(
                "    read {}, written {}, filtered {}, skipped {}, commits {}",
                step.read_count,
                step.write_count,
                step.filter_count,
                step.skip_count(),
                step.commit_count
            );
            if let Some(cause) = &step.failure_cause {
                println!("    {}", cause.red());
            }
        }
    }

    if !execution.warnings.is_empty() {
        println!("\n{}", "Warnings:".bold());
        for warning in &execution.warnings {
            println!("  {}", warning.yellow());
        }
    }

    if let Some(cause) = &execution.failure_cause {
        println!("\n{}", "Error:".bold());
        println!("{}", cause.red());
    }
}

/// Colorize execution status for display
fn colorize_status(status: ExecutionStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        ExecutionStatus::Starting | ExecutionStatus::Started => status_str.cyan(),
        ExecutionStatus::Completed => status_str.green(),
        ExecutionStatus::Failed => status_str.red(),
        ExecutionStatus::Stopped => status_str.dimmed(),
    }
}
