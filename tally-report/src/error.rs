//! Error types for the sales report job

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling the report job
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to open report file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid report job configuration: {0}")]
    InvalidConfig(String),
}
