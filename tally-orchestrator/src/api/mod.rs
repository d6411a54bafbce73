//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod auth;
pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::collections::HashMap;
use std::sync::Arc;
use tally_engine::{JobFactory, JobLauncher};
use tower_http::trace::TraceLayer;

use crate::api::auth::Role;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub launcher: JobLauncher,
    /// Builds the job launched by `POST /jobs/start`
    pub factory: Arc<dyn JobFactory>,
    pub api_keys: Arc<HashMap<String, Role>>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/jobs/start", post(job::start_job))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Administrative endpoints
        .merge(admin)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tally_engine::item::{ListItemReader, ListItemWriter, PassThroughProcessor};
    use tally_engine::listener::NoopListener;
    use tally_engine::{
        BatchError, ChunkStep, InMemoryJobRepository, JobBuilder, JobDefinition, JobRepository,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    struct NumbersJob {
        broken: bool,
    }

    impl JobFactory for NumbersJob {
        fn job_name(&self) -> &str {
            "numbers-job"
        }

        fn create_job(&self) -> Result<JobDefinition, BatchError> {
            if self.broken {
                return Err(BatchError::JobCreation(anyhow::anyhow!(
                    "report_data.csv: No such file or directory"
                )));
            }
            let step = ChunkStep::builder("load")
                .chunk(2)
                .reader(ListItemReader::new(1..=5u32))
                .processor(PassThroughProcessor)
                .writer(ListItemWriter::<u32>::new())
                .build()?;
            JobBuilder::new("numbers-job").start(step).build()
        }
    }

    fn make_test_app(broken: bool) -> (Router, Arc<InMemoryJobRepository>) {
        let repository = Arc::new(InMemoryJobRepository::new());
        let mut api_keys = HashMap::new();
        api_keys.insert("admin-token".to_string(), Role::Admin);
        api_keys.insert("viewer-token".to_string(), Role::Viewer);

        let state = AppState {
            launcher: JobLauncher::new(repository.clone(), Arc::new(NoopListener)),
            factory: Arc::new(NumbersJob { broken }),
            api_keys: Arc::new(api_keys),
        };
        (create_router(state), repository)
    }

    fn start_request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/jobs/start");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Helper to read the full body from a response.
    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = make_test_app(false);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response.into_body()).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_start_requires_token() {
        let (app, repository) = make_test_app(false);

        let response = app.oneshot(start_request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_token() {
        let (app, _) = make_test_app(false);

        let response = app.oneshot(start_request(Some("guess"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_start_forbidden_for_viewer() {
        let (app, repository) = make_test_app(false);

        let response = app
            .oneshot(start_request(Some("viewer-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_start_launches_job_for_admin() {
        let (app, repository) = make_test_app(false);

        let response = app
            .oneshot(start_request(Some("admin-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["message"], "Job started successfully");
        assert_eq!(json["job_name"], "numbers-job");

        let id: Uuid = json["execution_id"].as_str().unwrap().parse().unwrap();
        let execution = repository.find_job_execution(id).await.unwrap();
        assert!(execution.is_some());
    }

    #[tokio::test]
    async fn test_each_trigger_is_a_new_execution() {
        let (app, repository) = make_test_app(false);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(start_request(Some("admin-token")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(repository.len(), 2);
    }

    #[tokio::test]
    async fn test_launch_failure_is_generic_500() {
        let (app, repository) = make_test_app(true);

        let response = app
            .oneshot(start_request(Some("admin-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response.into_body()).await;
        assert_eq!(json, serde_json::json!({ "error": "Job failed to start" }));
        assert!(repository.is_empty());
    }
}
