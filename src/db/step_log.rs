//! Step log lines, step results and execution ids.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::log::*;
use crate::store::StepLogSink;

#[async_trait]
impl StepLogSink for super::Db {
    async fn append(&self, entry: StepLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO step_log (job_name, log_type, message, note, step_execution_id, job_execution_id, correlation_id, created_by, created_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&entry.job_name)
        .bind(entry.log_type.to_string())
        .bind(entry.message.as_deref().map(truncate_message))
        .bind(&entry.note)
        .bind(entry.step_execution_id)
        .bind(entry.job_execution_id)
        .bind(&entry.correlation_id)
        .bind(&entry.created_by)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_result(&self, result: StepResult) -> Result<()> {
        sqlx::query(
            "INSERT INTO step_result (job_name, row_run, row_error, start_time, end_time, note, total,
                                      skip_reader, skip_processor, skip_writer, skip_total, skip_limit,
                                      step_execution_id, job_execution_id, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(&result.job_name)
        .bind(result.row_run)
        .bind(result.row_error)
        .bind(result.start_time)
        .bind(result.end_time)
        .bind(&result.note)
        .bind(result.total)
        .bind(result.skip_reader)
        .bind(result.skip_processor)
        .bind(result.skip_writer)
        .bind(result.skip_total)
        .bind(result.skip_limit)
        .bind(result.step_execution_id)
        .bind(result.job_execution_id)
        .bind(result.status.to_string())
        .bind(&result.created_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn next_execution_id(&self) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as("SELECT nextval('batch_execution_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn recent_results(&self, limit: i64) -> Result<Vec<StepResult>> {
        let rows: Vec<StepResultRow> = sqlx::query_as(
            "SELECT job_name, row_run, row_error, start_time, end_time, note, total,
                    skip_reader, skip_processor, skip_writer, skip_total, skip_limit,
                    step_execution_id, job_execution_id, status, created_by
             FROM step_result
             ORDER BY id DESC
             LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(StepResultRow::try_into_step_result)
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct StepResultRow {
    job_name: String,
    row_run: i64,
    row_error: i64,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: chrono::DateTime<chrono::Utc>,
    note: Option<String>,
    total: i64,
    skip_reader: i64,
    skip_processor: i64,
    skip_writer: i64,
    skip_total: i64,
    skip_limit: i64,
    step_execution_id: i64,
    job_execution_id: i64,
    status: String,
    created_by: Option<String>,
}

impl StepResultRow {
    fn try_into_step_result(self) -> Result<StepResult> {
        Ok(StepResult {
            job_name: self.job_name,
            row_run: self.row_run,
            row_error: self.row_error,
            start_time: self.start_time,
            end_time: self.end_time,
            note: self.note,
            total: self.total,
            skip_reader: self.skip_reader,
            skip_processor: self.skip_processor,
            skip_writer: self.skip_writer,
            skip_total: self.skip_total,
            skip_limit: self.skip_limit,
            step_execution_id: self.step_execution_id,
            job_execution_id: self.job_execution_id,
            status: self.status.parse()?,
            created_by: self.created_by,
        })
    }
}
