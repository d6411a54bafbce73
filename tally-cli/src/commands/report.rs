//! Report command handlers
//!
//! Validates a report file with the import pipeline, without a database.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;
use tally_core::domain::execution::ExecutionStatus;
use tally_core::domain::parameters::RunParameters;
use tally_engine::JobExecutor;
use tally_report::{ReportJobConfig, check_job};

use super::print_execution;

/// Report subcommands
#[derive(Subcommand)]
pub enum ReportCommands {
    /// Parse and validate a report file, printing the computed totals
    Check {
        /// Tab-delimited report to check
        path: PathBuf,

        /// Invalid records tolerated before the check fails
        #[arg(long, default_value_t = 3)]
        skip_limit: u32,

        /// Print every accepted row
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Handle report commands
pub async fn handle_report_command(command: ReportCommands) -> Result<()> {
    match command {
        ReportCommands::Check {
            path,
            skip_limit,
            verbose,
        } => check_report(path, skip_limit, verbose).await,
    }
}

async fn check_report(path: PathBuf, skip_limit: u32, verbose: bool) -> Result<()> {
    let mut config = ReportJobConfig::new(path);
    config.skip_limit = skip_limit;

    let (job, accepted) = check_job(&config).context("Failed to prepare report check")?;
    let execution = JobExecutor::default()
        .run(job, RunParameters::timestamped())
        .await;

    print_execution(&execution);

    if verbose {
        let items = accepted.items();
        println!("\n{}", format!("Accepted rows ({}):", items.len()).bold());
        for item in items {
            println!(
                "  region {:>4}  outlet {:>4}  {} + {} + {} = {}",
                item.region_id,
                item.outlet_id,
                item.smartphones,
                item.memory_cards,
                item.notebooks,
                item.total.to_string().green()
            );
        }
    }

    if execution.status != ExecutionStatus::Completed {
        anyhow::bail!("Report check failed");
    }
    Ok(())
}
