//! Step log entries and step results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column limit for `step_log.message`.
pub const MESSAGE_MAX_CHARS: usize = 4000;

/// Kind of a step log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    Start,
    Count,
    End,
    Error,
    Info,
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogType::Start => "START",
            LogType::Count => "COUNT",
            LogType::End => "END",
            LogType::Error => "ERROR",
            LogType::Info => "INFO",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "START" => Ok(LogType::Start),
            "COUNT" => Ok(LogType::Count),
            "END" => Ok(LogType::End),
            "ERROR" => Ok(LogType::Error),
            "INFO" => Ok(LogType::Info),
            _ => Err(Error::Other(format!("unknown log type: {s}"))),
        }
    }
}

/// One append-only line in the step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// Step name for step-scoped lines, job name for job-level notices.
    pub job_name: String,
    pub log_type: LogType,
    pub message: Option<String>,
    pub note: Option<String>,
    pub step_execution_id: Option<i64>,
    pub job_execution_id: Option<i64>,
    pub correlation_id: Option<String>,
    /// Owning job.
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Final status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Failed,
    /// Terminated without processing.
    Stopped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Stopped => "STOPPED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StepStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "COMPLETED" => Ok(StepStatus::Completed),
            "FAILED" => Ok(StepStatus::Failed),
            "STOPPED" => Ok(StepStatus::Stopped),
            _ => Err(Error::Other(format!("unknown step status: {s}"))),
        }
    }
}

/// Terminal record of one chunk-step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name.
    pub job_name: String,
    pub row_run: i64,
    pub row_error: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub note: Option<String>,
    /// Item-count estimate taken before the step ran; -1 when unknown.
    pub total: i64,
    pub skip_reader: i64,
    pub skip_processor: i64,
    pub skip_writer: i64,
    pub skip_total: i64,
    pub skip_limit: i64,
    pub step_execution_id: i64,
    pub job_execution_id: i64,
    pub status: StepStatus,
    pub created_by: Option<String>,
}

/// Cut a message to the column limit without splitting a character.
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MESSAGE_MAX_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
