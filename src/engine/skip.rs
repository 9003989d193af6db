//! Step errors, their classes, and the skip budget that decides which of them
//! a step survives.

use std::collections::HashSet;
use thiserror::Error;

use super::execution::StepExecution;

/// Default per-step skip budget.
pub const DEFAULT_SKIP_LIMIT: u32 = 99;

/// Coarse classification used by [`SkipPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Claim,
    Transform,
    Sink,
    Io,
    Storage,
    NonTransient,
}

/// Failure raised by a source, transform or sink.
#[derive(Debug, Error)]
pub enum StepError {
    /// Claiming the next page failed. The next read retries.
    #[error("claim failed: {0}")]
    Claim(String),

    /// One item could not be transformed.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A chunk could not be committed.
    #[error("write failed: {0}")]
    Sink(String),

    #[error("io error: {0}")]
    Io(String),

    #[error(transparent)]
    Storage(crate::error::Error),

    /// Never skipped, regardless of policy.
    #[error("non-transient failure: {0}")]
    NonTransient(String),
}

impl StepError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StepError::Claim(_) => ErrorClass::Claim,
            StepError::Transform(_) => ErrorClass::Transform,
            StepError::Sink(_) => ErrorClass::Sink,
            StepError::Io(_) => ErrorClass::Io,
            StepError::Storage(_) => ErrorClass::Storage,
            StepError::NonTransient(_) => ErrorClass::NonTransient,
        }
    }

    /// Error text followed by every source in the chain.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

impl From<crate::error::Error> for StepError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Claim(msg) => StepError::Claim(msg),
            crate::error::Error::Io(e) => StepError::Io(e.to_string()),
            other => StepError::Storage(other),
        }
    }
}

/// Which failures a step tolerates, and how many.
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    pub limit: u32,
    fatal: HashSet<ErrorClass>,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SKIP_LIMIT,
            fatal: HashSet::from([ErrorClass::Io]),
        }
    }
}

impl SkipPolicy {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Treat `class` as fatal.
    pub fn never_skip(mut self, class: ErrorClass) -> Self {
        self.fatal.insert(class);
        self
    }

    /// Allow `class` to be skipped. Has no effect on `NonTransient`.
    pub fn allow_skip(mut self, class: ErrorClass) -> Self {
        self.fatal.remove(&class);
        self
    }

    pub fn is_skippable(&self, class: ErrorClass) -> bool {
        class != ErrorClass::NonTransient && !self.fatal.contains(&class)
    }
}

/// Pipeline stage a skip was charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Read,
    Process,
    Write,
}

impl std::fmt::Display for SkipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipStage::Read => "read",
            SkipStage::Process => "process",
            SkipStage::Write => "write",
        };
        write!(f, "{s}")
    }
}

/// Why a step stopped early.
#[derive(Debug, Error)]
pub enum StepAbort {
    #[error("skip limit {limit} exceeded in {stage}: {cause}")]
    SkipLimitExceeded {
        limit: u32,
        stage: SkipStage,
        cause: StepError,
    },

    #[error("fatal error in {stage}: {cause}")]
    Fatal { stage: SkipStage, cause: StepError },
}

/// Charge one skip to `stage`, or decide the step cannot continue.
///
/// The counter is bumped before the budget is checked, so an exhausted
/// budget leaves `skip_total == limit + 1` on record.
pub fn admit_skip(
    policy: &SkipPolicy,
    exec: &mut StepExecution,
    stage: SkipStage,
    err: StepError,
) -> Result<StepError, StepAbort> {
    if !policy.is_skippable(err.class()) {
        return Err(StepAbort::Fatal { stage, cause: err });
    }

    match stage {
        SkipStage::Read => exec.read_skips += 1,
        SkipStage::Process => exec.process_skips += 1,
        SkipStage::Write => exec.write_skips += 1,
    }

    if exec.skip_total() > i64::from(policy.limit) {
        return Err(StepAbort::SkipLimitExceeded {
            limit: policy.limit,
            stage,
            cause: err,
        });
    }
    Ok(err)
}
