use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tally_core::domain::execution::{ExecutionStatus, JobExecution};
use tally_engine::JobExecutionListener;
use tracing::{error, info};

/// Audit log of report imports
///
/// Reports how many rows `sales_report` holds once an import completes.
#[derive(Debug, Clone)]
pub struct ReportImportListener {
    pool: PgPool,
}

impl ReportImportListener {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobExecutionListener for ReportImportListener {
    async fn before_job(&self, execution: &JobExecution) -> anyhow::Result<()> {
        info!(
            "Starting report import {} with parameters {}",
            execution.id, execution.parameters
        );
        Ok(())
    }

    async fn after_job(&self, execution: &JobExecution) -> anyhow::Result<()> {
        match execution.status {
            ExecutionStatus::Completed => {
                let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_report")
                    .fetch_one(&self.pool)
                    .await
                    .context("Failed to count imported rows")?;
                info!(
                    "Report import {} completed: sales_report holds {} row(s), {} skipped",
                    execution.id,
                    rows,
                    execution.skip_count()
                );
            }
            status => error!(
                "Report import {} ended with status {}: {}",
                execution.id,
                status,
                execution.failure_cause.as_deref().unwrap_or("no cause recorded")
            ),
        }
        Ok(())
    }
}
