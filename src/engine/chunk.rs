//! Chunked read → transform → write step with a skip budget.

use async_trait::async_trait;
use chrono::Utc;
use opentelemetry::KeyValue;
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

use super::execution::StepExecution;
use super::hooks::StepHooks;
use super::io::{Sink, Source, Transform};
use super::skip::{SkipPolicy, SkipStage, StepAbort, StepError, admit_skip};
use super::step::{Step, StepRun};
use crate::model::{LogType, StepStatus};
use crate::store::StepLogSink;
use crate::telemetry::metrics;
use crate::telemetry::step::{record_step_status, start_step_span};

/// Default number of items per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of committed items between COUNT lines.
pub const DEFAULT_REPORT_EVERY: i64 = 1000;

/// Tuning for a [`ChunkStep`].
#[derive(Debug, Clone)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub report_every: i64,
    pub skip_policy: SkipPolicy,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_every: DEFAULT_REPORT_EVERY,
            skip_policy: SkipPolicy::default(),
        }
    }
}

/// A step that pulls items from a [`Source`], converts each with a
/// [`Transform`], and hands fixed-size chunks to a [`Sink`].
///
/// Failures are charged to the skip budget of the stage they came from. A
/// read or transform failure drops one item; a sink failure drops the chunk.
/// The step aborts once the budget is spent or a failure is not skippable.
pub struct ChunkStep<I, O> {
    name: String,
    source: Box<dyn Source<I>>,
    transform: Box<dyn Transform<I, O>>,
    sink: Box<dyn Sink<O>>,
    settings: ChunkSettings,
    start_message: Option<String>,
    hooks: StepHooks<I, O>,
}

impl<I, O> ChunkStep<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        source: impl Source<I> + 'static,
        transform: impl Transform<I, O> + 'static,
        sink: impl Sink<O> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
            transform: Box::new(transform),
            sink: Box::new(sink),
            settings: ChunkSettings::default(),
            start_message: None,
            hooks: StepHooks::new(),
        }
    }

    pub fn settings(mut self, settings: ChunkSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.settings.chunk_size = size.max(1);
        self
    }

    pub fn report_every(mut self, items: i64) -> Self {
        self.settings.report_every = items.max(1);
        self
    }

    pub fn skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.settings.skip_policy = policy;
        self
    }

    /// Message of the START line. Defaults to "Start {step}".
    pub fn start_message(mut self, message: impl Into<String>) -> Self {
        self.start_message = Some(message.into());
        self
    }

    pub fn hooks(mut self, hooks: StepHooks<I, O>) -> Self {
        self.hooks = hooks;
        self
    }

    async fn before_step(&mut self, exec: &mut StepExecution) {
        exec.start_time = Utc::now();

        if exec.terminate_only {
            exec.note = Some("Terminate Step".to_string());
        } else {
            match self.source.count().await {
                Ok(total) => exec.total = total,
                Err(e) => {
                    warn!(step = %self.name, error = %e, "count estimate failed");
                    exec.log(LogType::Error, e.to_string(), Some(e.chain()));
                    exec.total = -1;
                }
            }
            exec.note = Some(format!("Total: {}", exec.total));
        }

        self.hooks.fire_before_step(exec);

        let message = self
            .start_message
            .clone()
            .unwrap_or_else(|| format!("Start {}", self.name));
        let note = format!("Total: {}, {}", exec.total, exec.params_note());
        exec.log(LogType::Start, message, Some(note));
    }

    fn after_step(&self, exec: &mut StepExecution) {
        exec.end_time = Some(Utc::now());
        let message = format!("Count: {}/{}", exec.processed, exec.total);
        let note = exec.params_note();
        exec.log(LogType::End, message, Some(note));
        self.hooks.fire_after_step(exec);
    }

    async fn run_chunks(
        &mut self,
        exec: &mut StepExecution,
        logs: &dyn StepLogSink,
    ) -> Result<(), StepAbort> {
        let chunk_size = self.settings.chunk_size.max(1);
        let mut since_log: i64 = 0;

        loop {
            let mut chunk: Vec<O> = Vec::with_capacity(chunk_size);
            let mut exhausted = false;

            while chunk.len() < chunk_size {
                let item = match self.source.read().await {
                    Ok(Some(item)) => item,
                    Ok(None) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => {
                        self.skip_read(exec, e)?;
                        continue;
                    }
                };
                match self.transform.process(&item).await {
                    Ok(out) => chunk.push(out),
                    Err(e) => self.skip_process(exec, &item, e)?,
                }
            }

            if !chunk.is_empty() {
                let n = chunk.len();
                exec.processed += n as i64;

                match self.sink.write(&chunk).await {
                    Ok(()) => {
                        metrics::chunks_committed()
                            .add(1, &[KeyValue::new("step", self.name.clone())]);
                        self.hooks.fire_after_chunk(exec, n);

                        since_log += n as i64;
                        if since_log >= self.settings.report_every || n < chunk_size {
                            report_progress(exec);
                            since_log = 0;
                        }
                    }
                    Err(e) => {
                        exec.processed -= n as i64;
                        self.skip_write(exec, &chunk, e)?;
                    }
                }
            }
            exec.flush(logs).await;

            if exhausted {
                break;
            }
        }

        if since_log > 0 {
            report_progress(exec);
        }
        Ok(())
    }

    fn skip_read(&self, exec: &mut StepExecution, err: StepError) -> Result<(), StepAbort> {
        let err = admit_skip(&self.settings.skip_policy, exec, SkipStage::Read, err)?;
        exec.failed += 1;
        self.record_skip(exec, SkipStage::Read, &err);
        self.hooks.fire_skip_in_read(exec, &err);
        Ok(())
    }

    fn skip_process(
        &self,
        exec: &mut StepExecution,
        item: &I,
        err: StepError,
    ) -> Result<(), StepAbort> {
        let err = admit_skip(&self.settings.skip_policy, exec, SkipStage::Process, err)?;
        exec.failed += 1;
        self.record_skip(exec, SkipStage::Process, &err);
        self.hooks.fire_skip_in_process(exec, item, &err);
        Ok(())
    }

    fn skip_write(
        &self,
        exec: &mut StepExecution,
        chunk: &[O],
        err: StepError,
    ) -> Result<(), StepAbort> {
        let err = admit_skip(&self.settings.skip_policy, exec, SkipStage::Write, err)?;
        exec.failed += chunk.len() as i64;
        self.record_skip(exec, SkipStage::Write, &err);
        self.hooks.fire_skip_in_write(exec, chunk, &err);
        Ok(())
    }

    fn record_skip(&self, exec: &mut StepExecution, stage: SkipStage, err: &StepError) {
        metrics::skips().add(
            1,
            &[
                KeyValue::new("step", self.name.clone()),
                KeyValue::new("stage", stage.to_string()),
            ],
        );
        warn!(
            step = %self.name,
            %stage,
            skip_total = exec.skip_total(),
            error = %err,
            "skipped failure"
        );
        exec.log(LogType::Error, err.to_string(), Some(err.chain()));
    }
}

fn report_progress(exec: &mut StepExecution) {
    let message = format!("Count: {}/{}", exec.processed, exec.total);
    let note = exec.params_note();
    exec.log(LogType::Count, message, Some(note));
}

#[async_trait]
impl<I, O> Step for ChunkStep<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, run: StepRun<'_>) -> StepStatus {
        let span = start_step_span(&self.name, run.step_execution_id);
        let started = Instant::now();
        let mut exec = StepExecution::new(
            self.name.clone(),
            run.ctx,
            run.step_execution_id,
            run.terminate_only,
            self.settings.skip_policy.limit,
        );

        let status = async {
            self.before_step(&mut exec).await;
            exec.flush(run.logs).await;

            let status = if exec.terminate_only {
                StepStatus::Stopped
            } else {
                match self.run_chunks(&mut exec, run.logs).await {
                    Ok(()) => StepStatus::Completed,
                    Err(abort) => {
                        error!(step = %self.name, error = %abort, "step aborted");
                        let chain = match &abort {
                            StepAbort::SkipLimitExceeded { cause, .. }
                            | StepAbort::Fatal { cause, .. } => cause.chain(),
                        };
                        exec.log(LogType::Error, abort.to_string(), Some(chain));
                        StepStatus::Failed
                    }
                }
            };
            exec.status = Some(status);

            self.after_step(&mut exec);
            exec.flush(run.logs).await;

            if let Err(e) = run.logs.record_result(exec.to_result()).await {
                error!(step = %self.name, error = %e, "failed to record step result");
            }

            info!(
                step = %self.name,
                %status,
                processed = exec.processed,
                failed = exec.failed,
                skip_total = exec.skip_total(),
                "step finished"
            );
            status
        }
        .instrument(span.clone())
        .await;

        record_step_status(&span, &status.to_string());
        metrics::step_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[
                KeyValue::new("step", self.name.clone()),
                KeyValue::new("status", status.to_string()),
            ],
        );
        status
    }
}
