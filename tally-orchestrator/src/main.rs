use anyhow::Context;
use std::sync::Arc;
use tally_engine::{JobExecutionListener, JobLauncher, JobRepository};
use tally_report::{ReportImportListener, ReportJobFactory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use config::Config;
use repository::execution_repository::PgJobRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tally_orchestrator=debug,tally_engine=info,tally_report=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Wire the batch engine
    let repository: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
    let listener: Arc<dyn JobExecutionListener> =
        Arc::new(ReportImportListener::new(pool.clone()));
    let launcher = JobLauncher::new(repository, listener);
    let factory = Arc::new(ReportJobFactory::new(pool, config.report_job()));

    tracing::info!(
        "Report job reads {} (chunk size {}, skip limit {})",
        config.report_path.display(),
        config.chunk_size,
        config.skip_limit
    );

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        launcher,
        factory,
        api_keys: Arc::new(config.api_keys.clone()),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
