//! Job Service
//!
//! Launches batch jobs on behalf of the API.

use tally_core::domain::execution::JobExecution;
use tally_core::domain::parameters::RunParameters;
use tally_engine::{BatchError, JobFactory, JobLauncher};

/// Launch a fresh run of the job built by `factory`
///
/// Every call gets new timestamped parameters, so each trigger is its own job
/// instance. The run continues in the background; only the launch itself is
/// reported.
pub async fn start_job(
    launcher: &JobLauncher,
    factory: &dyn JobFactory,
) -> Result<JobExecution, BatchError> {
    let parameters = RunParameters::timestamped();

    let (execution, _handle) = launcher.launch(factory, parameters).await?;

    tracing::info!(
        "Job '{}' launched: execution {}",
        execution.job_name,
        execution.id
    );

    Ok(execution)
}
