//! Lifecycle hooks around jobs and steps
//!
//! Hooks observe executions through shared references and cannot change the
//! outcome of a run. An error returned from a hook is recorded as a warning
//! on the job execution.

use async_trait::async_trait;
use std::sync::Arc;
use tally_core::domain::execution::{JobExecution, StepExecution};

#[async_trait]
pub trait JobExecutionListener: Send + Sync {
    async fn before_job(&self, _execution: &JobExecution) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called exactly once per run, after the status is terminal
    async fn after_job(&self, _execution: &JobExecution) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_step(&self, _execution: &StepExecution) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_step(&self, _execution: &StepExecution) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

#[async_trait]
impl JobExecutionListener for NoopListener {}

/// Fans every hook out to a list of listeners, in order
///
/// All listeners run even when one fails; the errors are joined.
#[derive(Default, Clone)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn JobExecutionListener>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn JobExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

fn join_errors(errors: Vec<anyhow::Error>) -> anyhow::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(|e| format!("{:#}", e))
        .collect::<Vec<_>>()
        .join("; ");
    Err(anyhow::anyhow!(joined))
}

#[async_trait]
impl JobExecutionListener for CompositeListener {
    async fn before_job(&self, execution: &JobExecution) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for listener in &self.listeners {
            if let Err(e) = listener.before_job(execution).await {
                errors.push(e);
            }
        }
        join_errors(errors)
    }

    async fn after_job(&self, execution: &JobExecution) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for listener in &self.listeners {
            if let Err(e) = listener.after_job(execution).await {
                errors.push(e);
            }
        }
        join_errors(errors)
    }

    async fn before_step(&self, execution: &StepExecution) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for listener in &self.listeners {
            if let Err(e) = listener.before_step(execution).await {
                errors.push(e);
            }
        }
        join_errors(errors)
    }

    async fn after_step(&self, execution: &StepExecution) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for listener in &self.listeners {
            if let Err(e) = listener.after_step(execution).await {
                errors.push(e);
            }
        }
        join_errors(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_core::domain::parameters::RunParameters;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobExecutionListener for Counting {
        async fn after_job(&self, _execution: &JobExecution) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("mail server unreachable");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_composite_runs_every_listener() {
        let failing = Arc::new(Counting {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Counting::default());
        let composite = CompositeListener::new()
            .with(failing.clone())
            .with(healthy.clone());
        let execution = JobExecution::new("import", RunParameters::new());

        let err = composite.after_job(&execution).await.unwrap_err();

        assert_eq!(err.to_string(), "mail server unreachable");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        let execution = JobExecution::new("import", RunParameters::new());
        assert!(NoopListener.before_job(&execution).await.is_ok());
        assert!(NoopListener.after_job(&execution).await.is_ok());
        assert!(CompositeListener::new().is_empty());
    }
}
