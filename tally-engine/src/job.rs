//! Job definitions and the job executor

use std::collections::HashSet;
use std::sync::Arc;
use tally_core::domain::execution::{ExecutionStatus, JobExecution};
use tally_core::domain::parameters::RunParameters;
use tracing::{error, info, warn};

use crate::error::BatchError;
use crate::listener::{JobExecutionListener, NoopListener};
use crate::repository::JobRepository;
use crate::step::{Step, StepDefinition, StepExecutor, guard_hook};

/// An ordered, immutable sequence of steps
pub struct JobDefinition {
    name: String,
    steps: Vec<StepDefinition>,
}

impl JobDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Builds a [`JobDefinition`] step by step
pub struct JobBuilder {
    name: String,
    steps: Vec<StepDefinition>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// First step of the job
    pub fn start(self, step: impl Step + 'static) -> Self {
        self.next(step)
    }

    pub fn next(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn build(self) -> Result<JobDefinition, BatchError> {
        if self.steps.is_empty() {
            return Err(BatchError::InvalidDefinition(format!(
                "job '{}' has no steps",
                self.name
            )));
        }

        {
            let mut seen = HashSet::new();
            let duplicate = self
                .steps
                .iter()
                .map(|s| s.name())
                .find(|name| !seen.insert(*name));
            if let Some(name) = duplicate {
                return Err(BatchError::InvalidDefinition(format!(
                    "job '{}' has more than one step named '{}'",
                    self.name, name
                )));
            }
        }

        Ok(JobDefinition {
            name: self.name,
            steps: self.steps,
        })
    }
}

/// Builds a fresh job definition for every launch
///
/// Readers are consumed by a run, so a definition can never be reused.
pub trait JobFactory: Send + Sync {
    fn job_name(&self) -> &str;

    fn create_job(&self) -> Result<JobDefinition, BatchError>;
}

/// Runs the steps of a job in order and records the outcome
#[derive(Clone)]
pub struct JobExecutor {
    listener: Arc<dyn JobExecutionListener>,
    repository: Option<Arc<dyn JobRepository>>,
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new(Arc::new(NoopListener))
    }
}

impl JobExecutor {
    pub fn new(listener: Arc<dyn JobExecutionListener>) -> Self {
        Self {
            listener,
            repository: None,
        }
    }

    /// Persists every transition of the runs this executor drives
    pub fn with_repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Runs `job` as a new, unrecorded execution
    pub async fn run(&self, job: JobDefinition, parameters: RunParameters) -> JobExecution {
        let execution = JobExecution::new(job.name(), parameters);
        self.execute(job, execution).await
    }

    /// Drives an execution created beforehand to a terminal status
    pub async fn execute(&self, mut job: JobDefinition, mut execution: JobExecution) -> JobExecution {
        let mut warnings = Vec::new();

        guard_hook(
            &mut warnings,
            "before_job",
            &execution.job_name,
            self.listener.before_job(&execution),
        )
        .await;

        execution.mark_started();
        info!(
            "Job '{}' started (execution {})",
            execution.job_name, execution.id
        );
        self.persist(&execution, &mut warnings).await;

        let steps = StepExecutor::new(Arc::clone(&self.listener));
        for step in job.steps.iter_mut() {
            let step_execution = steps.run(step.as_mut(), &mut warnings).await;

            if let Some(repository) = &self.repository {
                if let Err(e) = repository
                    .save_step_execution(execution.id, &step_execution)
                    .await
                {
                    let message = format!(
                        "Failed to save step execution '{}': {}",
                        step_execution.step_name, e
                    );
                    warn!("{}", message);
                    warnings.push(message);
                }
            }

            let failed = step_execution.status == ExecutionStatus::Failed;
            let cause = step_execution.failure_cause.clone();
            execution.step_executions.push(step_execution);

            if failed {
                execution.mark_failed(cause.unwrap_or_else(|| "step failed".to_string()));
                break;
            }
        }

        if !execution.status.is_terminal() {
            execution.mark_completed();
        }

        match execution.status {
            ExecutionStatus::Completed => info!(
                "Job '{}' completed (execution {})",
                execution.job_name, execution.id
            ),
            status => error!(
                "Job '{}' {} (execution {}): {}",
                execution.job_name,
                status,
                execution.id,
                execution.failure_cause.as_deref().unwrap_or("no cause recorded")
            ),
        }

        guard_hook(
            &mut warnings,
            "after_job",
            &execution.job_name,
            self.listener.after_job(&execution),
        )
        .await;

        execution.warnings.append(&mut warnings);
        self.persist(&execution, &mut warnings).await;
        execution.warnings.extend(warnings);

        execution
    }

    async fn persist(&self, execution: &JobExecution, warnings: &mut Vec<String>) {
        let Some(repository) = &self.repository else {
            return;
        };
        if let Err(e) = repository.update_job_execution(execution).await {
            let message = format!("Failed to persist job execution {}: {}", execution.id, e);
            warn!("{}", message);
            warnings.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Tasklet;
    use crate::step::TaskletStep;
    use async_trait::async_trait;
    use tally_core::domain::execution::StepExecution;

    struct Noop;

    #[async_trait]
    impl Tasklet for Noop {
        async fn execute(&mut self, _step: &StepExecution) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tasklet for Failing {
        async fn execute(&mut self, _step: &StepExecution) -> anyhow::Result<()> {
            anyhow::bail!("relation \"sales_report\" does not exist")
        }
    }

    #[test]
    fn test_builder_rejects_empty_job() {
        let err = JobBuilder::new("import").build().unwrap_err();
        assert!(matches!(err, BatchError::InvalidDefinition(_)));
    }

    #[test]
    fn test_builder_rejects_duplicate_step_names() {
        let err = JobBuilder::new("import")
            .start(TaskletStep::new("clear", Noop))
            .next(TaskletStep::new("clear", Noop))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than one step named 'clear'"));
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let job = JobBuilder::new("import")
            .start(TaskletStep::new("first", Noop))
            .next(TaskletStep::new("second", Noop))
            .build()
            .unwrap();
        assert_eq!(job.name(), "import");
        assert_eq!(job.step_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_all_steps_completed() {
        let job = JobBuilder::new("import")
            .start(TaskletStep::new("first", Noop))
            .next(TaskletStep::new("second", Noop))
            .build()
            .unwrap();

        let execution = JobExecutor::default().run(job, RunParameters::new()).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.step_executions.len(), 2);
        assert!(execution.start_time.is_some());
        assert!(execution.end_time.is_some());
        assert!(execution.failure_cause.is_none());
    }

    #[tokio::test]
    async fn test_failed_step_halts_job() {
        let job = JobBuilder::new("import")
            .start(TaskletStep::new("clear", Failing))
            .next(TaskletStep::new("load", Noop))
            .build()
            .unwrap();

        let execution = JobExecutor::default().run(job, RunParameters::new()).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.step_executions.len(), 1);
        assert!(execution.step("load").is_none());
        assert_eq!(
            execution.failure_cause.as_deref(),
            Some("tasklet failed: relation \"sales_report\" does not exist")
        );
    }
}
