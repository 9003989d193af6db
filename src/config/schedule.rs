//! Schedule definitions loaded from TOML.
//!
//! ```toml
//! [[schedule]]
//! job = "SAMPLE_JOB"
//! interval_secs = 300
//! lock_at_most_for_secs = 600
//! lock_at_least_for_secs = 300
//!
//! [schedule.params]
//! pageSize = 10
//! ```

use crate::error::{Error, Result};
use crate::model::JobParams;
use crate::schedule::LockConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_LOCK_AT_MOST_FOR_SECS: u64 = 600;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    schedule: Vec<ScheduleEntry>,
}

/// One scheduled job.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntry {
    pub job: String,
    pub interval_secs: u64,
    /// Defaults to `{job}_SCHEDULER_LOCK`.
    #[serde(default)]
    pub lock_name: Option<String>,
    #[serde(default = "default_lock_at_most_for_secs")]
    pub lock_at_most_for_secs: u64,
    #[serde(default)]
    pub lock_at_least_for_secs: u64,
    #[serde(default)]
    pub params: JobParams,
}

fn default_lock_at_most_for_secs() -> u64 {
    DEFAULT_LOCK_AT_MOST_FOR_SECS
}

impl ScheduleEntry {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lock_config(&self) -> Result<LockConfig> {
        let name = self
            .lock_name
            .clone()
            .unwrap_or_else(|| format!("{}_SCHEDULER_LOCK", self.job));
        LockConfig::new(
            name,
            Duration::from_secs(self.lock_at_most_for_secs),
            Duration::from_secs(self.lock_at_least_for_secs),
        )
    }
}

/// Parse schedule definitions from TOML text.
pub fn parse_schedules(content: &str) -> Result<Vec<ScheduleEntry>> {
    let file: ScheduleFile = toml::from_str(content)
        .map_err(|e| Error::Config(format!("bad schedule config: {e}")))?;

    for entry in &file.schedule {
        if entry.interval_secs == 0 {
            return Err(Error::Config(format!(
                "schedule for {}: interval_secs must be positive",
                entry.job
            )));
        }
        entry.lock_config()?;
    }
    Ok(file.schedule)
}

/// Load schedule definitions from a TOML file.
pub fn load_schedules(path: &Path) -> Result<Vec<ScheduleEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read schedule file {}: {e}", path.display()))
    })?;
    parse_schedules(&content)
}
