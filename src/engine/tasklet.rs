//! Single-shot steps.
//!
//! A tasklet runs one unit of work instead of a chunk loop. It leaves no step
//! log lines or step result, only tracing output.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{Instrument, error, info};

use super::execution::RunContext;
use super::skip::StepError;
use super::step::{Step, StepRun};
use crate::model::StepStatus;
use crate::telemetry::step::{record_step_status, start_step_span};

#[async_trait]
pub trait Tasklet: Send {
    async fn run(&mut self, ctx: &RunContext) -> Result<(), StepError>;
}

/// Adapts a [`Tasklet`] to the [`Step`] interface.
pub struct TaskletStep<T> {
    name: String,
    tasklet: T,
}

impl<T: Tasklet> TaskletStep<T> {
    pub fn new(name: impl Into<String>, tasklet: T) -> Self {
        Self {
            name: name.into(),
            tasklet,
        }
    }
}

#[async_trait]
impl<T: Tasklet> Step for TaskletStep<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, run: StepRun<'_>) -> StepStatus {
        let span = start_step_span(&self.name, run.step_execution_id);
        let started = Instant::now();

        let status = async {
            if run.terminate_only {
                info!(step = %self.name, "tasklet stopped before start");
                return StepStatus::Stopped;
            }
            match self.tasklet.run(run.ctx).await {
                Ok(()) => StepStatus::Completed,
                Err(e) => {
                    error!(step = %self.name, error = %e.chain(), "tasklet failed");
                    StepStatus::Failed
                }
            }
        }
        .instrument(span.clone())
        .await;

        record_step_status(&span, &status.to_string());
        info!(
            step = %self.name,
            %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tasklet finished"
        );
        status
    }
}
