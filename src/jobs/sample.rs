//! Demonstration job: the work item step, a list-doubling chunk step, and a
//! tasklet.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::transaction::{DEFAULT_PAGE_SIZE, page_size, transaction_step};
use crate::engine::{
    ChunkStep, FnTransform, ListSource, RunContext, Sink, Step, StepError, StepHooks, Tasklet,
    TaskletStep,
};
use crate::external::ExternalApi;
use crate::job::Job;
use crate::model::{JobParams, LogType};
use crate::store::WorkClaimStore;

pub const SAMPLE_JOB: &str = "SAMPLE_JOB";
pub const SAMPLE_STEP: &str = "SAMPLE_STEP";
pub const SAMPLE_TASKLET: &str = "SAMPLE_TASKLET";

/// Sink that only logs what it receives.
pub struct LoggingSink;

#[async_trait]
impl Sink<i64> for LoggingSink {
    async fn write(&mut self, chunk: &[i64]) -> Result<(), StepError> {
        for value in chunk {
            info!(value, "writing result");
        }
        info!(count = chunk.len(), "written items");
        Ok(())
    }
}

/// Reads 1..=10 and doubles each number.
pub fn sample_step() -> ChunkStep<i64, i64> {
    let hooks = StepHooks::new()
        .before_step(|exec| {
            exec.log(
                LogType::Info,
                "Sample step started",
                Some("Will process 10 numbers".to_string()),
            );
        })
        .after_step(|exec| {
            let note = format!("Processed {} items", exec.processed);
            exec.log(LogType::Info, "Sample step completed", Some(note));
        });

    ChunkStep::new(
        SAMPLE_STEP,
        ListSource::new((1..=10).collect()),
        FnTransform(|n: &i64| -> Result<i64, StepError> { Ok(n * 2) }),
        LoggingSink,
    )
    .start_message("Starting sample step - processing numbers from 1 to 10")
    .hooks(hooks)
}

/// Logs its parameters and finishes.
pub struct SampleTasklet;

#[async_trait]
impl Tasklet for SampleTasklet {
    async fn run(&mut self, ctx: &RunContext) -> Result<(), StepError> {
        info!("sample tasklet executing");
        if !ctx.params.is_empty() {
            info!(params = %ctx.params_note(), "tasklet parameters");
        }
        info!("sample tasklet completed");
        Ok(())
    }
}

pub struct SampleJob {
    store: Arc<dyn WorkClaimStore>,
    api: Arc<dyn ExternalApi>,
}

impl SampleJob {
    pub fn new(store: Arc<dyn WorkClaimStore>, api: Arc<dyn ExternalApi>) -> Self {
        Self { store, api }
    }
}

impl Job for SampleJob {
    fn name(&self) -> &str {
        SAMPLE_JOB
    }

    fn validate(&self, params: &JobParams) -> Result<(), String> {
        page_size(params).map(|_| ())
    }

    fn steps(&self, params: &JobParams) -> Vec<Box<dyn Step>> {
        let page_size = page_size(params).unwrap_or(DEFAULT_PAGE_SIZE);
        vec![
            Box::new(transaction_step(
                Arc::clone(&self.store),
                Arc::clone(&self.api),
                page_size,
            )),
            Box::new(sample_step()),
            Box::new(TaskletStep::new(SAMPLE_TASKLET, SampleTasklet)),
        ]
    }
}
