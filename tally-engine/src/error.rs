//! Error types for the batch engine

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Classification of a per-item failure
///
/// Skip policies decide on the kind alone, never on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A field value is out of its allowed range
    Validation,
    /// The record does not have the expected shape
    MalformedRecord,
    /// The source could not be read
    Io,
    /// The sink rejected a chunk
    Write,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "validation failure",
            Self::MalformedRecord => "malformed record",
            Self::Io => "I/O failure",
            Self::Write => "write failure",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// A failure attached to a single item or a single chunk write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRecord, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Write, message)
    }
}

/// Errors that end a step, a job, or a launch attempt
#[derive(Debug, Error)]
pub enum BatchError {
    /// A skippable item error arrived after the skip limit was reached
    #[error("skip limit of {limit} exceeded: {cause}")]
    SkipLimitExceeded { limit: u32, cause: ItemError },

    /// An item error the skip policy does not allow to skip
    #[error("non-skippable error: {0}")]
    NonSkippable(ItemError),

    /// The sink failed to commit a chunk
    #[error("chunk commit failed: {0}")]
    Write(ItemError),

    #[error("tasklet failed: {0:#}")]
    Tasklet(anyhow::Error),

    /// A step panicked while executing
    #[error("step panicked: {0}")]
    Panicked(String),

    #[error("invalid job definition: {0}")]
    InvalidDefinition(String),

    /// The job could not be assembled for a launch
    #[error("failed to create job: {0:#}")]
    JobCreation(anyhow::Error),

    #[error("job instance '{job_name}' with parameters {parameters} is already complete")]
    JobInstanceAlreadyComplete {
        job_name: String,
        parameters: String,
    },

    #[error("job instance '{job_name}' with parameters {parameters} is already running")]
    JobExecutionAlreadyRunning {
        job_name: String,
        parameters: String,
    },

    #[error("job execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// The execution-history store failed
    #[error("job repository error: {0}")]
    Repository(String),
}

impl BatchError {
    /// Whether this error prevented a job from being launched at all
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::JobCreation(_)
                | Self::JobInstanceAlreadyComplete { .. }
                | Self::JobExecutionAlreadyRunning { .. }
                | Self::Repository(_)
                | Self::InvalidDefinition(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display() {
        let err = ItemError::validation("smartphones is negative");
        assert_eq!(err.to_string(), "validation failure: smartphones is negative");
    }

    #[test]
    fn test_skip_limit_exceeded_display() {
        let err = BatchError::SkipLimitExceeded {
            limit: 3,
            cause: ItemError::validation("line 4"),
        };
        assert_eq!(
            err.to_string(),
            "skip limit of 3 exceeded: validation failure: line 4"
        );
    }

    #[test]
    fn test_tasklet_display_includes_context_chain() {
        let source = anyhow::anyhow!("connection refused").context("Failed to clear table");
        let err = BatchError::Tasklet(source);
        assert_eq!(
            err.to_string(),
            "tasklet failed: Failed to clear table: connection refused"
        );
    }

    #[test]
    fn test_launch_errors() {
        assert!(BatchError::Repository("down".to_string()).is_launch_error());
        assert!(
            BatchError::JobInstanceAlreadyComplete {
                job_name: "import".to_string(),
                parameters: "{}".to_string(),
            }
            .is_launch_error()
        );
        assert!(!BatchError::Write(ItemError::write("rollback")).is_launch_error());
    }
}
