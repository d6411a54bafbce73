use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Destination of the report import
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sales_report (
            id BIGSERIAL PRIMARY KEY,
            region_id BIGINT NOT NULL,
            outlet_id BIGINT NOT NULL,
            smartphones NUMERIC NOT NULL,
            memory_cards NUMERIC NOT NULL,
            notebooks NUMERIC NOT NULL,
            total NUMERIC NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create job executions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_job_execution (
            id UUID PRIMARY KEY,
            job_name VARCHAR(255) NOT NULL,
            parameters JSONB NOT NULL DEFAULT '{}',
            identity_key VARCHAR(64) NOT NULL,
            status VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            start_time TIMESTAMPTZ,
            end_time TIMESTAMPTZ,
            failure_cause TEXT,
            warnings TEXT[] NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create step executions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_step_execution (
            id UUID PRIMARY KEY,
            job_execution_id UUID NOT NULL REFERENCES batch_job_execution(id) ON DELETE CASCADE,
            step_name VARCHAR(255) NOT NULL,
            kind VARCHAR(20) NOT NULL,
            status VARCHAR(20) NOT NULL,
            read_count BIGINT NOT NULL DEFAULT 0,
            write_count BIGINT NOT NULL DEFAULT 0,
            filter_count BIGINT NOT NULL DEFAULT 0,
            read_skip_count BIGINT NOT NULL DEFAULT 0,
            process_skip_count BIGINT NOT NULL DEFAULT 0,
            commit_count BIGINT NOT NULL DEFAULT 0,
            rollback_count BIGINT NOT NULL DEFAULT 0,
            start_time TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ,
            failure_cause TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for instance lookups
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_execution_instance \
         ON batch_job_execution(job_name, identity_key, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_step_execution_job \
         ON batch_step_execution(job_execution_id, start_time)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
