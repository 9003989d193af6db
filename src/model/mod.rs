//! Core data model.
//!
//! Work items are the records being processed. Job configs gate and
//! parameterize runs. Step log entries and step results are the durable
//! record of what each run did.

pub mod job;
pub mod log;
pub mod work;

pub use job::{JobConfig, JobConfigUpdate, JobParams};
pub use log::{LogType, StepLogEntry, StepResult, StepStatus};
pub use work::{NewWorkItem, WorkItem, WorkStatus};
