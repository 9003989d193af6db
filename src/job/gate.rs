//! Per-job run gate: persisted switch, parameter overlay, run orchestration.

use chrono::Utc;
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

use super::{Job, JobStatus, RunOutcome};
use crate::engine::execution::new_correlation_id;
use crate::engine::{RunContext, StepRun};
use crate::error::{OrchestrationError, Result};
use crate::model::job::overlay_params;
use crate::model::{JobParams, LogType, StepLogEntry, StepStatus};
use crate::store::{JobConfigStore, StepLogSink};
use crate::telemetry::metrics;
use crate::telemetry::step::{record_job_outcome, start_job_span};

/// Wraps one [`Job`] and decides, per request, whether and how it runs.
///
/// Every run reads the job's persisted config first: a disabled job is
/// reported and skipped, an enabled one runs with the persisted parameter
/// overlay under the caller's parameters. Runs of the same gate never
/// overlap.
pub struct JobRunGate {
    job: Arc<dyn Job>,
    configs: Arc<dyn JobConfigStore>,
    logs: Arc<dyn StepLogSink>,
    schedule_enabled: bool,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl JobRunGate {
    pub fn new(
        job: Arc<dyn Job>,
        configs: Arc<dyn JobConfigStore>,
        logs: Arc<dyn StepLogSink>,
    ) -> Self {
        Self {
            job,
            configs,
            logs,
            schedule_enabled: true,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Global switch consulted by [`JobRunGate::run_if_schedule_enabled`].
    pub fn with_schedule_enabled(mut self, enabled: bool) -> Self {
        self.schedule_enabled = enabled;
        self
    }

    pub fn job_name(&self) -> &str {
        self.job.name()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Make the remaining steps of the current run stop without processing.
    pub fn request_stop(&self) {
        info!(job = %self.job.name(), "stop requested");
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Run the job now. Never fails; problems end up in the outcome and logs.
    pub async fn run(&self, caller_params: JobParams) -> RunOutcome {
        let correlation_id = new_correlation_id();
        let span = start_job_span(self.job.name(), &correlation_id);

        let outcome = self
            .gate(caller_params, correlation_id)
            .instrument(span.clone())
            .await;

        let label = outcome.label();
        record_job_outcome(&span, &label);
        metrics::job_runs().add(
            1,
            &[
                KeyValue::new("job", self.job.name().to_string()),
                KeyValue::new("outcome", label),
            ],
        );
        outcome
    }

    /// Start a run in the background. The handle may be dropped.
    pub fn run_async(self: &Arc<Self>, caller_params: JobParams) -> JoinHandle<RunOutcome> {
        let gate = Arc::clone(self);
        tokio::spawn(async move { gate.run(caller_params).await })
    }

    /// Scheduled entry point: honors the global schedule switch.
    pub async fn run_if_schedule_enabled(&self, caller_params: JobParams) -> RunOutcome {
        if !self.schedule_enabled {
            warn!(job = %self.job.name(), "scheduled runs are disabled, skipping");
            metrics::job_runs().add(
                1,
                &[
                    KeyValue::new("job", self.job.name().to_string()),
                    KeyValue::new("outcome", RunOutcome::ScheduleDisabled.label()),
                ],
            );
            return RunOutcome::ScheduleDisabled;
        }
        self.run(caller_params).await
    }

    async fn gate(&self, caller_params: JobParams, correlation_id: String) -> RunOutcome {
        let name = self.job.name();

        let config = match self.configs.find(name).await {
            Ok(config) => config,
            Err(e) => {
                error!(job = %name, error = %e, "failed to load job config");
                let message = format!("Config lookup failed: {e}");
                self.job_notice(LogType::Error, message, &correlation_id)
                    .await;
                return RunOutcome::Finished(JobStatus::Failed);
            }
        };

        let params = match config {
            Some(config) if !config.enabled => {
                info!(job = %name, "job is disabled, not run");
                let message = format!("Job {name} is disabled, not run");
                self.job_notice(LogType::Info, message, &correlation_id)
                    .await;
                return RunOutcome::Disabled;
            }
            Some(config) => match config.overlay() {
                Ok(Some(persisted)) => overlay_params(&persisted, &caller_params),
                Ok(None) => caller_params,
                Err(e) => {
                    warn!(job = %name, error = %e, "ignoring malformed persisted parameters");
                    caller_params
                }
            },
            None => caller_params,
        };

        match self.execute(params, &correlation_id).await {
            Ok(status) => RunOutcome::Finished(status),
            Err(e) => {
                error!(job = %name, error = %e, "job run failed");
                self.job_notice(LogType::Error, e.to_string(), &correlation_id)
                    .await;
                RunOutcome::Finished(JobStatus::Failed)
            }
        }
    }

    async fn execute(&self, params: JobParams, correlation_id: &str) -> Result<JobStatus> {
        let name = self.job.name();

        self.job
            .validate(&params)
            .map_err(|reason| OrchestrationError::InvalidParameters {
                job: name.to_string(),
                reason,
            })?;

        let _running = RunningGuard::acquire(&self.running)
            .ok_or_else(|| OrchestrationError::AlreadyRunning(name.to_string()))?;
        self.stop_requested.store(false, Ordering::Release);

        let job_execution_id = self.allocate_execution_id().await?;
        let ctx = RunContext::new(name, job_execution_id, params)
            .with_correlation_id(correlation_id);
        info!(job = %name, job_execution_id, params = %ctx.params_note(), "job started");

        let mut status = JobStatus::Completed;
        for mut step in self.job.steps(&ctx.params) {
            let terminate_only = self.stop_requested.load(Ordering::Acquire);
            let step_execution_id = self.allocate_execution_id().await?;

            let run = StepRun {
                ctx: &ctx,
                step_execution_id,
                terminate_only,
                logs: self.logs.as_ref(),
            };
            match step.execute(run).await {
                StepStatus::Completed => {}
                StepStatus::Stopped => status = JobStatus::Stopped,
                StepStatus::Failed => {
                    warn!(job = %name, step = %step.name(), "step failed, ending job");
                    status = JobStatus::Failed;
                    break;
                }
            }
        }

        info!(job = %name, job_execution_id, %status, "job finished");
        Ok(status)
    }

    async fn allocate_execution_id(&self) -> Result<i64> {
        self.logs.next_execution_id().await.map_err(|e| {
            OrchestrationError::ExecutionId {
                job: self.job.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Job-level step log line, outside any step execution.
    async fn job_notice(&self, log_type: LogType, message: String, correlation_id: &str) {
        let name = self.job.name();
        let entry = StepLogEntry {
            job_name: name.to_string(),
            log_type,
            message: Some(crate::model::log::truncate_message(&message)),
            note: None,
            step_execution_id: None,
            job_execution_id: None,
            correlation_id: Some(correlation_id.to_string()),
            created_by: Some(name.to_string()),
            created_at: Utc::now(),
        };
        if let Err(e) = self.logs.append(entry).await {
            error!(job = %name, error = %e, "failed to write job notice");
        }
    }
}

/// Holds the gate's running flag for the duration of one run.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
