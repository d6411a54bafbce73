//! Job command handlers
//!
//! Starts the import on the orchestrator, or runs it in-process.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::domain::execution::ExecutionStatus;
use tally_core::domain::parameters::RunParameters;
use tally_engine::{InMemoryJobRepository, JobLauncher};
use tally_report::{ReportImportListener, ReportJobConfig, ReportJobFactory};

use super::print_execution;
use crate::api::ApiClient;
use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Launch the import job on the orchestrator
    Start,
    /// Run the import job in this process and wait for the outcome
    Run {
        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,

        /// Tab-delimited report to import
        #[arg(long, default_value = "report_data.csv")]
        report: PathBuf,

        /// Items per committed chunk
        #[arg(long, default_value_t = 10)]
        chunk_size: usize,

        /// Invalid records tolerated before the run fails
        #[arg(long, default_value_t = 3)]
        skip_limit: u32,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    match command {
        JobCommands::Start => {
            let client = ApiClient::new(&config.orchestrator_url, config.api_key.clone());
            start_job(&client).await
        }
        JobCommands::Run {
            database_url,
            report,
            chunk_size,
            skip_limit,
        } => {
            let job_config = ReportJobConfig {
                report_path: report,
                chunk_size,
                skip_limit,
            };
            run_job(&database_url, job_config).await
        }
    }
}

/// Trigger the job remotely
async fn start_job(client: &ApiClient) -> Result<()> {
    let response = client.start_job().await?;

    println!("{} {}", "✓".green(), response.message);
    println!("  Job:       {}", response.job_name);
    println!("  Execution: {}", response.execution_id.to_string().cyan());

    Ok(())
}

/// Run the job against the database and print the outcome
async fn run_job(database_url: &str, job_config: ReportJobConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    let launcher = JobLauncher::new(
        Arc::new(InMemoryJobRepository::new()),
        Arc::new(ReportImportListener::new(pool.clone())),
    );
    let factory = ReportJobFactory::new(pool, job_config);

    let execution = launcher
        .run(&factory, RunParameters::timestamped())
        .await
        .context("Job failed to start")?;

    print_execution(&execution);

    if execution.status != ExecutionStatus::Completed {
        anyhow::bail!("Job finished with status {}", execution.status);
    }
    Ok(())
}
