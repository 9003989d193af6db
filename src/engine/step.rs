//! The unit a job is made of.

use async_trait::async_trait;

use super::execution::RunContext;
use crate::model::StepStatus;
use crate::store::StepLogSink;

/// Everything a step needs from the run that launched it.
pub struct StepRun<'a> {
    pub ctx: &'a RunContext,
    pub step_execution_id: i64,
    /// Record the step as stopped without doing any work.
    pub terminate_only: bool,
    pub logs: &'a dyn StepLogSink,
}

/// One step of a job: a chunk loop or a single-shot tasklet.
///
/// Steps never return errors. Whatever goes wrong is logged and folded into
/// the returned status.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &str;

    async fn execute(&mut self, run: StepRun<'_>) -> StepStatus;
}
