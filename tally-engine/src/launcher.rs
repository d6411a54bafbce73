//! Job launcher
//!
//! Launching builds a fresh job from its factory and records a new execution.
//! Only when both succeed is the run handed to the executor; any failure
//! before that is a launch error and leaves no execution behind.

use std::sync::Arc;
use tally_core::domain::execution::JobExecution;
use tally_core::domain::parameters::RunParameters;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{BatchError, Result};
use crate::job::{JobDefinition, JobExecutor, JobFactory};
use crate::listener::JobExecutionListener;
use crate::repository::JobRepository;

#[derive(Clone)]
pub struct JobLauncher {
    repository: Arc<dyn JobRepository>,
    executor: JobExecutor,
}

impl JobLauncher {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        listener: Arc<dyn JobExecutionListener>,
    ) -> Self {
        let executor = JobExecutor::new(listener).with_repository(Arc::clone(&repository));
        Self {
            repository,
            executor,
        }
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    async fn prepare(
        &self,
        factory: &dyn JobFactory,
        parameters: RunParameters,
    ) -> Result<(JobDefinition, JobExecution)> {
        let job = factory.create_job().map_err(|e| match e {
            BatchError::JobCreation(_) => e,
            other => BatchError::JobCreation(anyhow::Error::new(other)),
        })?;
        let execution = self
            .repository
            .create_job_execution(job.name(), &parameters)
            .await?;
        Ok((job, execution))
    }

    /// Starts a run in the background
    ///
    /// Returns the execution as recorded at launch, together with the handle
    /// of the task driving it.
    pub async fn launch(
        &self,
        factory: &dyn JobFactory,
        parameters: RunParameters,
    ) -> Result<(JobExecution, JoinHandle<JobExecution>)> {
        let (job, execution) = self.prepare(factory, parameters).await.inspect_err(|e| {
            error!("Failed to launch job '{}': {}", factory.job_name(), e);
        })?;

        info!(
            "Launching job '{}' (execution {}, parameters {})",
            execution.job_name, execution.id, execution.parameters
        );

        let executor = self.executor.clone();
        let snapshot = execution.clone();
        let handle = tokio::spawn(async move { executor.execute(job, execution).await });

        Ok((snapshot, handle))
    }

    /// Runs a job to completion on the current task
    pub async fn run(
        &self,
        factory: &dyn JobFactory,
        parameters: RunParameters,
    ) -> Result<JobExecution> {
        let (job, execution) = self.prepare(factory, parameters).await.inspect_err(|e| {
            error!("Failed to launch job '{}': {}", factory.job_name(), e);
        })?;
        Ok(self.executor.execute(job, execution).await)
    }
}
