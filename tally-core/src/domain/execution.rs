//! Execution domain types
//!
//! Records describing one run of a job and of each of its steps. The batch
//! engine is the only writer of these records; the orchestrator persists them
//! and listeners only ever see shared references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::parameters::RunParameters;

/// Lifecycle status shared by job and step executions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Starting,
    Started,
    Completed,
    Failed,
    Stopped,
}

impl ExecutionStatus {
    /// Terminal statuses never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Whether an execution in this status is still in flight
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Tasklet,
    Chunk,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasklet => "TASKLET",
            Self::Chunk => "CHUNK",
        }
    }
}

/// Execution record of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub step_name: String,
    pub kind: StepKind,
    pub status: ExecutionStatus,
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub read_skip_count: u64,
    pub process_skip_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub failure_cause: Option<String>,
}

impl StepExecution {
    /// Creates a step execution in `Starting`
    pub fn new(step_name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_name: step_name.into(),
            kind,
            status: ExecutionStatus::Starting,
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            read_skip_count: 0,
            process_skip_count: 0,
            commit_count: 0,
            rollback_count: 0,
            start_time: Utc::now(),
            end_time: None,
            failure_cause: None,
        }
    }

    /// Total number of items skipped, on read and on process
    pub fn skip_count(&self) -> u64 {
        self.read_skip_count + self.process_skip_count
    }

    pub fn mark_started(&mut self) {
        if self.status == ExecutionStatus::Starting {
            self.status = ExecutionStatus::Started;
        }
    }

    pub fn mark_completed(&mut self) {
        self.finish(ExecutionStatus::Completed, None);
    }

    pub fn mark_failed(&mut self, cause: impl Into<String>) {
        self.finish(ExecutionStatus::Failed, Some(cause.into()));
    }

    fn finish(&mut self, status: ExecutionStatus, cause: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.failure_cause = cause;
        self.end_time = Some(Utc::now());
    }
}

/// Execution record of one run of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: RunParameters,
    pub status: ExecutionStatus,
    pub step_executions: Vec<StepExecution>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub failure_cause: Option<String>,
    /// Non-fatal problems raised while running, such as failing listeners
    pub warnings: Vec<String>,
}

impl JobExecution {
    /// Creates a job execution in `Starting`
    pub fn new(job_name: impl Into<String>, parameters: RunParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            parameters,
            status: ExecutionStatus::Starting,
            step_executions: Vec::new(),
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            failure_cause: None,
            warnings: Vec::new(),
        }
    }

    pub fn mark_started(&mut self) {
        if self.status == ExecutionStatus::Starting {
            self.status = ExecutionStatus::Started;
            self.start_time = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self) {
        self.finish(ExecutionStatus::Completed, None);
    }

    pub fn mark_failed(&mut self, cause: impl Into<String>) {
        self.finish(ExecutionStatus::Failed, Some(cause.into()));
    }

    fn finish(&mut self, status: ExecutionStatus, cause: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.failure_cause = cause;
        self.end_time = Some(Utc::now());
    }

    /// Looks up the execution of a step by name
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.step_executions.iter().find(|s| s.step_name == name)
    }

    /// Sum of skipped items over all steps
    pub fn skip_count(&self) -> u64 {
        self.step_executions.iter().map(StepExecution::skip_count).sum()
    }

    /// Sum of written items over all steps
    pub fn write_count(&self) -> u64 {
        self.step_executions.iter().map(|s| s.write_count).sum()
    }
}
