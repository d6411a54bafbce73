//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tally_core::dto::job::ErrorResponse;
use tally_engine::BatchError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    /// The job could not be launched; the cause is logged, never returned
    LaunchFailed(BatchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::LaunchFailed(err) => {
                tracing::error!("Job launch failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Job failed to start".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        ApiError::LaunchFailed(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
