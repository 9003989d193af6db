//! Error types for claimbatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// Contention or timeout while claiming work. Callers retry later.
    #[error("claim failed: {0}")]
    Claim(String),

    /// A persisted parameter document could not be parsed.
    #[error("malformed job parameters: {0}")]
    ConfigParse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Failures raised by the run gate before or around step execution.
///
/// These never escape a run; the gate logs them and reports a failed job.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("invalid parameters for job {job}: {reason}")]
    InvalidParameters { job: String, reason: String },

    #[error("cannot allocate execution id for job {job}: {reason}")]
    ExecutionId { job: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
