//! Steps and the step executor
//!
//! A step is either a [`TaskletStep`] (one atomic operation) or a
//! [`ChunkStep`] (read-process-write loop). The [`StepExecutor`] owns the
//! step lifecycle: it creates the [`StepExecution`], fires the step hooks,
//! and turns every outcome of the step, including a panic, into a terminal
//! status.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tally_core::domain::execution::{ExecutionStatus, StepExecution, StepKind};
use tracing::{debug, error, info, warn};

use crate::chunk::{StepContribution, run_chunk};
use crate::error::BatchError;
use crate::item::{ItemProcessor, ItemReader, ItemWriter, Tasklet};
use crate::listener::JobExecutionListener;
use crate::skip::{NeverSkipPolicy, SkipCounter, SkipPolicy};

/// A unit of work inside a job
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> StepKind;

    /// Runs the step, updating counters on `execution` as it goes
    ///
    /// Status transitions are left to the [`StepExecutor`].
    async fn execute(&mut self, execution: &mut StepExecution) -> Result<(), BatchError>;
}

/// Type-erased step as stored in a job definition
pub type StepDefinition = Box<dyn Step>;

/// Step running a single tasklet once
pub struct TaskletStep {
    name: String,
    tasklet: Box<dyn Tasklet>,
}

impl TaskletStep {
    pub fn new(name: impl Into<String>, tasklet: impl Tasklet + 'static) -> Self {
        Self {
            name: name.into(),
            tasklet: Box::new(tasklet),
        }
    }
}

#[async_trait]
impl Step for TaskletStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StepKind {
        StepKind::Tasklet
    }

    async fn execute(&mut self, execution: &mut StepExecution) -> Result<(), BatchError> {
        self.tasklet
            .execute(execution)
            .await
            .map_err(BatchError::Tasklet)?;
        execution.commit_count += 1;
        Ok(())
    }
}

/// Chunk-oriented step
pub struct ChunkStep<I, O> {
    name: String,
    chunk_size: usize,
    reader: Box<dyn ItemReader<I>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Box<dyn ItemWriter<O>>,
    skip_policy: Box<dyn SkipPolicy>,
}

impl<I, O> ChunkStep<I, O> {
    pub fn builder(name: impl Into<String>) -> ChunkStepBuilder<I, O> {
        ChunkStepBuilder::new(name)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[async_trait]
impl<I, O> Step for ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StepKind {
        StepKind::Chunk
    }

    async fn execute(&mut self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let mut counter = SkipCounter::new();
        let mut chunk_number = 0u64;

        loop {
            chunk_number += 1;
            let mut contribution = StepContribution::default();
            let outcome = run_chunk(
                self.reader.as_mut(),
                self.processor.as_ref(),
                self.writer.as_mut(),
                self.skip_policy.as_ref(),
                &mut counter,
                self.chunk_size,
                &mut contribution,
            )
            .await;
            contribution.apply_to(execution);

            match outcome {
                Ok(result) => {
                    debug!(
                        "Step '{}' chunk {}: {} written, {} skipped",
                        self.name, chunk_number, result.items_written, result.items_skipped
                    );
                    if result.exhausted {
                        return Ok(());
                    }
                }
                Err(e) => {
                    execution.rollback_count += 1;
                    return Err(e);
                }
            }
        }
    }
}

/// Builder for [`ChunkStep`]
pub struct ChunkStepBuilder<I, O> {
    name: String,
    chunk_size: usize,
    reader: Option<Box<dyn ItemReader<I>>>,
    processor: Option<Box<dyn ItemProcessor<I, O>>>,
    writer: Option<Box<dyn ItemWriter<O>>>,
    skip_policy: Option<Box<dyn SkipPolicy>>,
}

impl<I, O> ChunkStepBuilder<I, O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunk_size: 1,
            reader: None,
            processor: None,
            writer: None,
            skip_policy: None,
        }
    }

    /// Number of items read per commit
    pub fn chunk(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn reader(mut self, reader: impl ItemReader<I> + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn processor(mut self, processor: impl ItemProcessor<I, O> + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    pub fn writer(mut self, writer: impl ItemWriter<O> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Enables fault tolerance; without it every item error is fatal
    pub fn skip_policy(mut self, policy: impl SkipPolicy + 'static) -> Self {
        self.skip_policy = Some(Box::new(policy));
        self
    }

    pub fn build(self) -> Result<ChunkStep<I, O>, BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::InvalidDefinition(format!(
                "step '{}' must have a chunk size greater than 0",
                self.name
            )));
        }

        let missing = |what: &str| {
            BatchError::InvalidDefinition(format!("step '{}' has no {}", self.name, what))
        };
        let reader = self.reader.ok_or_else(|| missing("reader"))?;
        let processor = self.processor.ok_or_else(|| missing("processor"))?;
        let writer = self.writer.ok_or_else(|| missing("writer"))?;

        Ok(ChunkStep {
            name: self.name,
            chunk_size: self.chunk_size,
            reader,
            processor,
            writer,
            skip_policy: self
                .skip_policy
                .unwrap_or_else(|| Box::new(NeverSkipPolicy)),
        })
    }
}

/// Runs steps and records their executions
pub struct StepExecutor {
    listener: Arc<dyn JobExecutionListener>,
}

impl StepExecutor {
    pub fn new(listener: Arc<dyn JobExecutionListener>) -> Self {
        Self { listener }
    }

    /// Runs one step to a terminal status
    ///
    /// Never fails: errors and panics of the step are recorded as the failure
    /// cause. Listener errors are appended to `warnings`.
    pub async fn run(&self, step: &mut dyn Step, warnings: &mut Vec<String>) -> StepExecution {
        let mut execution = StepExecution::new(step.name(), step.kind());

        guard_hook(
            warnings,
            "before_step",
            step.name(),
            self.listener.before_step(&execution),
        )
        .await;

        execution.mark_started();
        info!("Executing step '{}' ({})", step.name(), step.kind().as_str());

        let outcome = AssertUnwindSafe(step.execute(&mut execution))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => execution.mark_completed(),
            Ok(Err(e)) => execution.mark_failed(e.to_string()),
            Err(panic) => {
                let err = BatchError::Panicked(panic_message(panic.as_ref()));
                execution.mark_failed(err.to_string());
            }
        }

        match execution.status {
            ExecutionStatus::Completed => info!(
                "Step '{}' completed: read={}, written={}, skipped={}, filtered={}, commits={}",
                execution.step_name,
                execution.read_count,
                execution.write_count,
                execution.skip_count(),
                execution.filter_count,
                execution.commit_count
            ),
            _ => error!(
                "Step '{}' failed: {}",
                execution.step_name,
                execution.failure_cause.as_deref().unwrap_or("unknown cause")
            ),
        }

        guard_hook(
            warnings,
            "after_step",
            &execution.step_name,
            self.listener.after_step(&execution),
        )
        .await;

        execution
    }
}

fn record_warning(
    warnings: &mut Vec<String>,
    hook: &str,
    subject: &str,
    err: anyhow::Error,
) {
    let message = format!("Listener {} for '{}' failed: {:#}", hook, subject, err);
    warn!("{}", message);
    warnings.push(message);
}

/// Awaits a listener hook, turning an error or a panic into a warning
pub(crate) async fn guard_hook<F>(
    warnings: &mut Vec<String>,
    hook: &str,
    subject: &str,
    hook_call: F,
) where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(hook_call).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => record_warning(warnings, hook, subject, e),
        Err(panic) => {
            let err = anyhow::anyhow!("panicked: {}", panic_message(panic.as_ref()));
            record_warning(warnings, hook, subject, err);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
