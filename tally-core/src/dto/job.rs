//! Job DTOs for the orchestrator API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement returned when a job was launched
///
/// Only says that the run started; the eventual outcome is not reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchResponse {
    pub message: String,
    pub job_name: String,
    pub execution_id: Uuid,
}

/// Error body returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
