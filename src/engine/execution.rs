//! Per-run and per-step execution state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::log::{LogType, StepLogEntry, StepResult, StepStatus, truncate_message};
use crate::model::{JobParams, job::params_note};
use crate::store::StepLogSink;

/// Fresh correlation id: 32 upper-case hex characters.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

/// Identity and parameters of one job run, shared by all of its steps.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_name: String,
    pub correlation_id: String,
    pub job_execution_id: i64,
    pub params: JobParams,
}

impl RunContext {
    pub fn new(job_name: impl Into<String>, job_execution_id: i64, params: JobParams) -> Self {
        Self {
            job_name: job_name.into(),
            correlation_id: new_correlation_id(),
            job_execution_id,
            params,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Parameters rendered for log notes.
    pub fn params_note(&self) -> String {
        params_note(&self.params)
    }
}

/// Mutable state of one step execution.
///
/// Owned by the engine and lent to hooks. Hooks may adjust counters and queue
/// log lines with [`StepExecution::log`]; queued lines are written at the
/// next lifecycle point.
#[derive(Debug)]
pub struct StepExecution {
    pub step_name: String,
    pub job_name: String,
    pub step_execution_id: i64,
    pub job_execution_id: i64,
    pub correlation_id: String,
    pub params: JobParams,
    pub terminate_only: bool,
    /// Count estimate taken in `before_step`; -1 when unknown.
    pub total: i64,
    /// Items in committed chunks.
    pub processed: i64,
    /// Items excluded by skips.
    pub failed: i64,
    pub read_skips: i64,
    pub process_skips: i64,
    pub write_skips: i64,
    pub skip_limit: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub status: Option<StepStatus>,
    pending: Vec<StepLogEntry>,
}

impl StepExecution {
    pub fn new(
        step_name: impl Into<String>,
        ctx: &RunContext,
        step_execution_id: i64,
        terminate_only: bool,
        skip_limit: u32,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            job_name: ctx.job_name.clone(),
            step_execution_id,
            job_execution_id: ctx.job_execution_id,
            correlation_id: ctx.correlation_id.clone(),
            params: ctx.params.clone(),
            terminate_only,
            total: 0,
            processed: 0,
            failed: 0,
            read_skips: 0,
            process_skips: 0,
            write_skips: 0,
            skip_limit: i64::from(skip_limit),
            start_time: Utc::now(),
            end_time: None,
            note: None,
            status: None,
            pending: Vec::new(),
        }
    }

    pub fn skip_total(&self) -> i64 {
        self.read_skips + self.process_skips + self.write_skips
    }

    pub fn params_note(&self) -> String {
        params_note(&self.params)
    }

    /// Queue a step log line.
    pub fn log(&mut self, log_type: LogType, message: impl AsRef<str>, note: Option<String>) {
        self.pending.push(StepLogEntry {
            job_name: self.step_name.clone(),
            log_type,
            message: Some(truncate_message(message.as_ref())),
            note,
            step_execution_id: Some(self.step_execution_id),
            job_execution_id: Some(self.job_execution_id),
            correlation_id: Some(self.correlation_id.clone()),
            created_by: Some(self.job_name.clone()),
            created_at: Utc::now(),
        });
    }

    /// Write queued lines to `logs`. Sink failures are reported and dropped.
    pub async fn flush(&mut self, logs: &dyn StepLogSink) {
        for entry in self.pending.drain(..) {
            if let Err(e) = logs.append(entry).await {
                tracing::error!(
                    step = %self.step_name,
                    cid = %self.correlation_id,
                    error = %e,
                    "failed to write step log entry"
                );
            }
        }
    }

    pub fn to_result(&self) -> StepResult {
        StepResult {
            job_name: self.step_name.clone(),
            row_run: self.processed,
            row_error: self.failed,
            start_time: self.start_time,
            end_time: self.end_time.unwrap_or_else(Utc::now),
            note: self.note.clone(),
            total: self.total,
            skip_reader: self.read_skips,
            skip_processor: self.process_skips,
            skip_writer: self.write_skips,
            skip_total: self.skip_total(),
            skip_limit: self.skip_limit,
            step_execution_id: self.step_execution_id,
            job_execution_id: self.job_execution_id,
            status: self.status.unwrap_or(StepStatus::Completed),
            created_by: Some(self.job_name.clone()),
        }
    }
}
