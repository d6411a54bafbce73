use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tally_core::domain::execution::StepExecution;
use tally_engine::Tasklet;
use tracing::info;

/// Empties `sales_report` before a fresh load
#[derive(Debug, Clone)]
pub struct ClearReportTableTasklet {
    pool: PgPool,
}

impl ClearReportTableTasklet {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Tasklet for ClearReportTableTasklet {
    async fn execute(&mut self, _step: &StepExecution) -> anyhow::Result<()> {
        info!("Clearing sales_report table");

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let deleted = sqlx::query("DELETE FROM sales_report")
            .execute(&mut *tx)
            .await
            .context("Failed to clear sales_report")?
            .rows_affected();
        tx.commit().await.context("Failed to commit table clear")?;

        info!("Removed {} row(s) from sales_report", deleted);
        Ok(())
    }
}
