//! Execution history
//!
//! The repository records every job execution and its step executions, and
//! guards job instance identity: a job name plus its run parameters.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tally_core::domain::execution::{ExecutionStatus, JobExecution, StepExecution};
use tally_core::domain::parameters::RunParameters;
use uuid::Uuid;

use crate::error::{BatchError, Result};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Records a new execution in `Starting`
    ///
    /// Fails when the same job instance already completed or is still running.
    async fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<JobExecution>;

    async fn update_job_execution(&self, execution: &JobExecution) -> Result<()>;

    /// Inserts or replaces the record of one step
    async fn save_step_execution(
        &self,
        job_execution_id: Uuid,
        execution: &StepExecution,
    ) -> Result<()>;

    async fn find_job_execution(&self, id: Uuid) -> Result<Option<JobExecution>>;

    /// Most recent execution of the given job instance
    async fn last_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<Option<JobExecution>>;
}

/// Checks whether a job instance may get a new execution
///
/// `last` is the most recent execution of the instance, if any.
pub fn ensure_launchable(
    job_name: &str,
    parameters: &RunParameters,
    last: Option<&JobExecution>,
) -> Result<()> {
    match last.map(|e| e.status) {
        Some(ExecutionStatus::Completed) => Err(BatchError::JobInstanceAlreadyComplete {
            job_name: job_name.to_string(),
            parameters: parameters.to_string(),
        }),
        Some(status) if status.is_running() => Err(BatchError::JobExecutionAlreadyRunning {
            job_name: job_name.to_string(),
            parameters: parameters.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Repository keeping history in process memory
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    executions: Mutex<Vec<JobExecution>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<JobExecution>>> {
        self.executions
            .lock()
            .map_err(|e| BatchError::Repository(format!("Failed to lock executions: {}", e)))
    }

    fn last_of<'a>(
        executions: &'a [JobExecution],
        job_name: &str,
        parameters: &RunParameters,
    ) -> Option<&'a JobExecution> {
        let key = parameters.identity_key();
        executions
            .iter()
            .filter(|e| e.job_name == job_name && e.parameters.identity_key() == key)
            .max_by_key(|e| e.created_at)
    }

    /// Number of recorded executions, all jobs included
    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<JobExecution> {
        let mut executions = self.lock()?;
        ensure_launchable(
            job_name,
            parameters,
            Self::last_of(&executions, job_name, parameters),
        )?;

        let execution = JobExecution::new(job_name, parameters.clone());
        executions.push(execution.clone());
        Ok(execution)
    }

    async fn update_job_execution(&self, execution: &JobExecution) -> Result<()> {
        let mut executions = self.lock()?;
        let stored = executions
            .iter_mut()
            .find(|e| e.id == execution.id)
            .ok_or(BatchError::ExecutionNotFound(execution.id))?;
        *stored = execution.clone();
        Ok(())
    }

    async fn save_step_execution(
        &self,
        job_execution_id: Uuid,
        execution: &StepExecution,
    ) -> Result<()> {
        let mut executions = self.lock()?;
        let job = executions
            .iter_mut()
            .find(|e| e.id == job_execution_id)
            .ok_or(BatchError::ExecutionNotFound(job_execution_id))?;

        match job.step_executions.iter_mut().find(|s| s.id == execution.id) {
            Some(stored) => *stored = execution.clone(),
            None => job.step_executions.push(execution.clone()),
        }
        Ok(())
    }

    async fn find_job_execution(&self, id: Uuid) -> Result<Option<JobExecution>> {
        let executions = self.lock()?;
        Ok(executions.iter().find(|e| e.id == id).cloned())
    }

    async fn last_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<Option<JobExecution>> {
        let executions = self.lock()?;
        Ok(Self::last_of(&executions, job_name, parameters).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::domain::execution::StepKind;

    fn params(time: i64) -> RunParameters {
        RunParameters::builder().add_long("time", time).build()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryJobRepository::new();
        let created = repo.create_job_execution("import", &params(1)).await.unwrap();

        let found = repo.find_job_execution(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, ExecutionStatus::Starting);
        assert_eq!(found.job_name, "import");
        assert!(repo.find_job_execution(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_running_instance_cannot_be_launched_twice() {
        let repo = InMemoryJobRepository::new();
        repo.create_job_execution("import", &params(1)).await.unwrap();

        let err = repo
            .create_job_execution("import", &params(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::JobExecutionAlreadyRunning { .. }));

        // A different parameter set is a different instance
        assert!(repo.create_job_execution("import", &params(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_completed_instance_is_rejected() {
        let repo = InMemoryJobRepository::new();
        let mut execution = repo.create_job_execution("import", &params(1)).await.unwrap();
        execution.mark_started();
        execution.mark_completed();
        repo.update_job_execution(&execution).await.unwrap();

        let err = repo
            .create_job_execution("import", &params(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::JobInstanceAlreadyComplete { .. }));
    }

    #[tokio::test]
    async fn test_failed_instance_can_be_relaunched() {
        let repo = InMemoryJobRepository::new();
        let mut execution = repo.create_job_execution("import", &params(1)).await.unwrap();
        execution.mark_started();
        execution.mark_failed("skip limit of 3 exceeded");
        repo.update_job_execution(&execution).await.unwrap();

        let relaunched = repo.create_job_execution("import", &params(1)).await.unwrap();

        assert_ne!(relaunched.id, execution.id);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_save_step_execution_upserts() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create_job_execution("import", &params(1)).await.unwrap();
        let mut step = StepExecution::new("load", StepKind::Chunk);

        repo.save_step_execution(job.id, &step).await.unwrap();
        step.write_count = 7;
        repo.save_step_execution(job.id, &step).await.unwrap();

        let stored = repo.find_job_execution(job.id).await.unwrap().unwrap();
        assert_eq!(stored.step_executions.len(), 1);
        assert_eq!(stored.step_executions[0].write_count, 7);
    }

    #[tokio::test]
    async fn test_update_unknown_execution() {
        let repo = InMemoryJobRepository::new();
        let execution = JobExecution::new("import", params(1));

        let err = repo.update_job_execution(&execution).await.unwrap_err();
        assert!(matches!(err, BatchError::ExecutionNotFound(id) if id == execution.id));
    }
}
