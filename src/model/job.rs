//! Job configuration and run parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordered key → value run parameters. Insertion order is preserved.
pub type JobParams = serde_json::Map<String, serde_json::Value>;

/// Persisted per-job switch and parameter overlay.
///
/// Written by the control surface only; the engine reads it once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_name: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Raw parameter document as stored. Parsed lazily so a malformed value
    /// degrades to "no overlay" instead of failing the load.
    pub params: Option<String>,
    pub created_by: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub updated_date: Option<DateTime<Utc>>,
}

impl JobConfig {
    /// Parse the stored overlay. `Ok(None)` when nothing is stored.
    pub fn overlay(&self) -> Result<Option<JobParams>> {
        match self.params.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_params(raw).map(Some),
        }
    }
}

/// Create-or-update request from the control surface.
#[derive(Debug, Clone, Default)]
pub struct JobConfigUpdate {
    pub job_name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub params: Option<String>,
    pub updated_by: Option<String>,
}

/// Parse a parameter document. Anything other than a JSON object is rejected.
pub fn parse_params(raw: &str) -> Result<JobParams> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::ConfigParse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(Error::ConfigParse(e.to_string())),
    }
}

/// Overlay caller parameters on persisted ones; caller values win.
///
/// Persisted keys keep their position, caller-only keys are appended.
pub fn overlay_params(persisted: &JobParams, caller: &JobParams) -> JobParams {
    let mut merged = persisted.clone();
    for (key, value) in caller {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Render parameters for log notes.
pub fn params_note(params: &JobParams) -> String {
    serde_json::Value::Object(params.clone()).to_string()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
