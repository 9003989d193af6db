//! Jobs and the gate every run passes through.

pub mod gate;

pub use gate::JobRunGate;

use crate::engine::Step;
use crate::model::JobParams;

/// A named, ordered sequence of steps.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Reject effective parameters before any step runs.
    fn validate(&self, _params: &JobParams) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Build fresh step instances for one run.
    fn steps(&self, params: &JobParams) -> Vec<Box<dyn Step>>;
}

/// Final status of a job run that got past the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed,
    Stopped,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// What happened to a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job's persisted switch is off; nothing ran.
    Disabled,
    /// Scheduled runs are globally off; nothing ran.
    ScheduleDisabled,
    Finished(JobStatus),
}

impl RunOutcome {
    /// Metric/span label.
    pub fn label(&self) -> String {
        match self {
            RunOutcome::Disabled => "disabled".to_string(),
            RunOutcome::ScheduleDisabled => "schedule_disabled".to_string(),
            RunOutcome::Finished(status) => status.to_string(),
        }
    }
}
