//! Job API Handlers
//!
//! HTTP endpoint for launching the report import.

use axum::{Json, extract::State};
use tally_core::dto::job::LaunchResponse;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::job_service;

/// POST /jobs/start
/// Launch a new run of the import job
pub async fn start_job(State(state): State<AppState>) -> ApiResult<Json<LaunchResponse>> {
    tracing::info!("Starting job '{}'", state.factory.job_name());

    let execution = job_service::start_job(&state.launcher, state.factory.as_ref()).await?;

    Ok(Json(LaunchResponse {
        message: "Job started successfully".to_string(),
        job_name: execution.job_name,
        execution_id: execution.id,
    }))
}
