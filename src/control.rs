//! Control surface: trigger jobs and manage their persisted configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{Error, Result};
use crate::job::{Job, JobRunGate, RunOutcome};
use crate::model::job::parse_params;
use crate::model::{JobConfig, JobConfigUpdate, JobParams};
use crate::store::{JobConfigStore, StepLogSink};

/// Registry of run gates plus config access, keyed by job name.
pub struct JobControl {
    gates: BTreeMap<String, Arc<JobRunGate>>,
    configs: Arc<dyn JobConfigStore>,
}

impl JobControl {
    pub fn new(configs: Arc<dyn JobConfigStore>) -> Self {
        Self {
            gates: BTreeMap::new(),
            configs,
        }
    }

    /// Wrap each job in a gate sharing the given stores.
    pub fn with_jobs(
        jobs: Vec<Arc<dyn Job>>,
        configs: Arc<dyn JobConfigStore>,
        logs: Arc<dyn StepLogSink>,
        schedule_enabled: bool,
    ) -> Self {
        let mut control = Self::new(Arc::clone(&configs));
        for job in jobs {
            let gate = JobRunGate::new(job, Arc::clone(&configs), Arc::clone(&logs))
                .with_schedule_enabled(schedule_enabled);
            control.register(Arc::new(gate));
        }
        control
    }

    pub fn register(&mut self, gate: Arc<JobRunGate>) {
        self.gates.insert(gate.job_name().to_string(), gate);
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.gates.keys().map(String::as_str)
    }

    pub fn gate(&self, job_name: &str) -> Result<&Arc<JobRunGate>> {
        self.gates
            .get(job_name)
            .ok_or_else(|| Error::NotFound(format!("job {job_name}")))
    }

    /// Run a job now and wait for it.
    pub async fn trigger(&self, job_name: &str, params: JobParams) -> Result<RunOutcome> {
        let gate = self.gate(job_name)?;
        info!(job = %job_name, "manual trigger");
        Ok(gate.run(params).await)
    }

    /// Start a job in the background.
    pub fn trigger_async(
        &self,
        job_name: &str,
        params: JobParams,
    ) -> Result<JoinHandle<RunOutcome>> {
        let gate = self.gate(job_name)?;
        info!(job = %job_name, "manual trigger (async)");
        Ok(gate.run_async(params))
    }

    pub fn request_stop(&self, job_name: &str) -> Result<()> {
        self.gate(job_name)?.request_stop();
        Ok(())
    }

    pub async fn get_config(&self, job_name: &str) -> Result<JobConfig> {
        self.configs
            .find(job_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job config {job_name}")))
    }

    /// Create or replace a job's config. Parameters must be a JSON object.
    pub async fn set_config(&self, update: JobConfigUpdate) -> Result<JobConfig> {
        let update = JobConfigUpdate {
            params: normalize_params(update.params)?,
            ..update
        };
        let config = self.configs.save(update).await?;
        info!(job = %config.job_name, enabled = config.enabled, "job config saved");
        Ok(config)
    }

    /// Replace only a job's parameter overlay.
    pub async fn update_params(
        &self,
        job_name: &str,
        params: Option<String>,
        updated_by: &str,
    ) -> Result<JobConfig> {
        let params = normalize_params(params)?;
        let config = self
            .configs
            .update_params(job_name, params, updated_by)
            .await?;
        info!(job = %job_name, "job parameters updated");
        Ok(config)
    }
}

/// Blank means "no overlay"; anything else must parse as a JSON object.
fn normalize_params(params: Option<String>) -> Result<Option<String>> {
    match params {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => {
            parse_params(&raw)?;
            Ok(Some(raw))
        }
        None => Ok(None),
    }
}
