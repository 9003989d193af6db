//! Fixed-delay trigger loops, one per scheduled job.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::{DistributedScheduleLock, LockConfig};
use crate::job::JobRunGate;
use crate::model::JobParams;

/// One job on a fixed-delay schedule.
#[derive(Clone)]
pub struct ScheduledJob {
    pub gate: Arc<JobRunGate>,
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    pub lock: LockConfig,
    pub params: JobParams,
}

/// Drives every [`ScheduledJob`] until shut down.
///
/// Each tick runs under the job's schedule lock, so across a fleet of
/// schedulers at most one fires per lease.
pub struct Scheduler {
    lock: DistributedScheduleLock,
    jobs: Vec<ScheduledJob>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(lock: DistributedScheduleLock) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            lock,
            jobs: Vec::new(),
            shutdown,
        }
    }

    pub fn add(&mut self, job: ScheduledJob) {
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Signal all loops to stop after their current tick.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run every loop until [`Scheduler::shutdown`] is called.
    pub async fn run(&self) {
        let mut tasks = JoinSet::new();
        for job in &self.jobs {
            tasks.spawn(tick_loop(
                job.clone(),
                self.lock.clone(),
                self.shutdown.subscribe(),
            ));
        }
        info!(jobs = self.jobs.len(), holder = %self.lock.holder(), "scheduler started");

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "schedule loop panicked");
            }
        }
        info!("scheduler stopped");
    }
}

async fn tick_loop(
    job: ScheduledJob,
    lock: DistributedScheduleLock,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = job.gate.job_name().to_string();
    debug!(job = %name, interval_secs = job.interval.as_secs_f64(), "schedule loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(job.interval) => {}
        }

        let gate = Arc::clone(&job.gate);
        let params = job.params.clone();
        let outcome = lock
            .run_locked(&job.lock, || async move {
                gate.run_if_schedule_enabled(params).await
            })
            .await;

        if let Some(outcome) = outcome {
            debug!(job = %name, outcome = %outcome.label(), "scheduled run finished");
        }
    }

    debug!(job = %name, "schedule loop stopped");
}
