//! Execution Repository
//!
//! Postgres-backed execution history of batch jobs.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tally_core::domain::execution::{ExecutionStatus, JobExecution, StepExecution, StepKind};
use tally_core::domain::parameters::RunParameters;
use tally_engine::repository::ensure_launchable;
use tally_engine::{BatchError, JobRepository};
use uuid::Uuid;

type Result<T> = std::result::Result<T, BatchError>;

/// Job repository storing executions in `batch_job_execution` and
/// `batch_step_execution`
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_steps(&self, job_execution_id: Uuid) -> Result<Vec<StepExecution>> {
        let rows = sqlx::query_as::<_, StepExecutionRow>(
            r#"
            SELECT id, step_name, kind, status, read_count, write_count, filter_count,
                   read_skip_count, process_skip_count, commit_count, rollback_count,
                   start_time, end_time, failure_cause
            FROM batch_step_execution
            WHERE job_execution_id = $1
            ORDER BY start_time ASC
            "#,
        )
        .bind(job_execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn with_steps(&self, row: Option<JobExecutionRow>) -> Result<Option<JobExecution>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut execution: JobExecution = row.into();
        execution.step_executions = self.find_steps(execution.id).await?;
        Ok(Some(execution))
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<JobExecution> {
        let identity_key = parameters.identity_key();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Serializes concurrent launches of the same job instance
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", job_name, identity_key))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let last = sqlx::query_as::<_, JobExecutionRow>(
            r#"
            SELECT id, job_name, parameters, status, created_at, start_time, end_time,
                   failure_cause, warnings
            FROM batch_job_execution
            WHERE job_name = $1 AND identity_key = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_name)
        .bind(&identity_key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .map(JobExecution::from);

        ensure_launchable(job_name, parameters, last.as_ref())?;

        let execution = JobExecution::new(job_name, parameters.clone());

        sqlx::query(
            r#"
            INSERT INTO batch_job_execution
                (id, job_name, parameters, identity_key, status, created_at, warnings)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(execution.id)
        .bind(&execution.job_name)
        .bind(Json(&execution.parameters))
        .bind(&identity_key)
        .bind(execution.status.as_str())
        .bind(execution.created_at)
        .bind(&execution.warnings)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::debug!("Job execution {} recorded for '{}'", execution.id, job_name);
        Ok(execution)
    }

    async fn update_job_execution(&self, execution: &JobExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch_job_execution
            SET status = $1, start_time = $2, end_time = $3, failure_cause = $4, warnings = $5
            WHERE id = $6
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.start_time)
        .bind(execution.end_time)
        .bind(&execution.failure_cause)
        .bind(&execution.warnings)
        .bind(execution.id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(BatchError::ExecutionNotFound(execution.id));
        }
        Ok(())
    }

    async fn save_step_execution(
        &self,
        job_execution_id: Uuid,
        execution: &StepExecution,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO batch_step_execution
                (id, job_execution_id, step_name, kind, status, read_count, write_count,
                 filter_count, read_skip_count, process_skip_count, commit_count,
                 rollback_count, start_time, end_time, failure_cause)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                read_count = EXCLUDED.read_count,
                write_count = EXCLUDED.write_count,
                filter_count = EXCLUDED.filter_count,
                read_skip_count = EXCLUDED.read_skip_count,
                process_skip_count = EXCLUDED.process_skip_count,
                commit_count = EXCLUDED.commit_count,
                rollback_count = EXCLUDED.rollback_count,
                end_time = EXCLUDED.end_time,
                failure_cause = EXCLUDED.failure_cause
            "#,
        )
        .bind(execution.id)
        .bind(job_execution_id)
        .bind(&execution.step_name)
        .bind(execution.kind.as_str())
        .bind(execution.status.as_str())
        .bind(count_to_db(execution.read_count))
        .bind(count_to_db(execution.write_count))
        .bind(count_to_db(execution.filter_count))
        .bind(count_to_db(execution.read_skip_count))
        .bind(count_to_db(execution.process_skip_count))
        .bind(count_to_db(execution.commit_count))
        .bind(count_to_db(execution.rollback_count))
        .bind(execution.start_time)
        .bind(execution.end_time)
        .bind(&execution.failure_cause)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_job_execution(&self, id: Uuid) -> Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecutionRow>(
            r#"
            SELECT id, job_name, parameters, status, created_at, start_time, end_time,
                   failure_cause, warnings
            FROM batch_job_execution
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        self.with_steps(row).await
    }

    async fn last_job_execution(
        &self,
        job_name: &str,
        parameters: &RunParameters,
    ) -> Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecutionRow>(
            r#"
            SELECT id, job_name, parameters, status, created_at, start_time, end_time,
                   failure_cause, warnings
            FROM batch_job_execution
            WHERE job_name = $1 AND identity_key = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_name)
        .bind(parameters.identity_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        self.with_steps(row).await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn db_error(err: sqlx::Error) -> BatchError {
    BatchError::Repository(err.to_string())
}

fn count_to_db(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn count_from_db(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn string_to_status(s: &str) -> ExecutionStatus {
    match s {
        "STARTING" => ExecutionStatus::Starting,
        "STARTED" => ExecutionStatus::Started,
        "COMPLETED" => ExecutionStatus::Completed,
        "FAILED" => ExecutionStatus::Failed,
        "STOPPED" => ExecutionStatus::Stopped,
        _ => ExecutionStatus::Failed,
    }
}

fn string_to_kind(s: &str) -> StepKind {
    match s {
        "TASKLET" => StepKind::Tasklet,
        _ => StepKind::Chunk,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobExecutionRow {
    id: Uuid,
    job_name: String,
    parameters: Json<RunParameters>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    failure_cause: Option<String>,
    warnings: Vec<String>,
}

impl From<JobExecutionRow> for JobExecution {
    fn from(row: JobExecutionRow) -> Self {
        JobExecution {
            id: row.id,
            job_name: row.job_name,
            parameters: row.parameters.0,
            status: string_to_status(&row.status),
            step_executions: Vec::new(),
            created_at: row.created_at,
            start_time: row.start_time,
            end_time: row.end_time,
            failure_cause: row.failure_cause,
            warnings: row.warnings,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StepExecutionRow {
    id: Uuid,
    step_name: String,
    kind: String,
    status: String,
    read_count: i64,
    write_count: i64,
    filter_count: i64,
    read_skip_count: i64,
    process_skip_count: i64,
    commit_count: i64,
    rollback_count: i64,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    failure_cause: Option<String>,
}

impl From<StepExecutionRow> for StepExecution {
    fn from(row: StepExecutionRow) -> Self {
        StepExecution {
            id: row.id,
            step_name: row.step_name,
            kind: string_to_kind(&row.kind),
            status: string_to_status(&row.status),
            read_count: count_from_db(row.read_count),
            write_count: count_from_db(row.write_count),
            filter_count: count_from_db(row.filter_count),
            read_skip_count: count_from_db(row.read_skip_count),
            process_skip_count: count_from_db(row.process_skip_count),
            commit_count: count_from_db(row.commit_count),
            rollback_count: count_from_db(row.rollback_count),
            start_time: row.start_time,
            end_time: row.end_time,
            failure_cause: row.failure_cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ExecutionStatus::Starting,
            ExecutionStatus::Started,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Stopped,
        ] {
            assert_eq!(string_to_status(status.as_str()), status);
        }
    }

    #[test]
    fn test_kind_from_column() {
        assert_eq!(string_to_kind("TASKLET"), StepKind::Tasklet);
        assert_eq!(string_to_kind("CHUNK"), StepKind::Chunk);
    }

    #[test]
    fn test_count_conversion_saturates() {
        assert_eq!(count_to_db(u64::MAX), i64::MAX);
        assert_eq!(count_from_db(-1), 0);
        assert_eq!(count_from_db(42), 42);
    }
}
