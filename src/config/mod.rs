//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod schedule;

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EXTERNAL_API_URL: &str = "http://localhost:8080/api/transaction";
pub const DEFAULT_EXTERNAL_API_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SCHEDULE_FILE: &str = "schedules.toml";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Global switch for scheduled runs. Manual triggers ignore it.
    pub schedule_enabled: bool,
    pub external_api_url: String,
    pub external_api_timeout: Duration,
    /// Identity written to the schedule lock table.
    pub instance_id: String,
    pub schedule_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            Error::Config("required environment variable DATABASE_URL is not set".to_string())
        })?;

        let schedule_enabled = match lookup("BATCH_SCHEDULE_ENABLED") {
            Some(raw) => parse_bool("BATCH_SCHEDULE_ENABLED", &raw)?,
            None => true,
        };

        let timeout_ms = match lookup("EXTERNAL_API_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("EXTERNAL_API_TIMEOUT_MS must be an integer: {e}"))
            })?,
            None => DEFAULT_EXTERNAL_API_TIMEOUT_MS,
        };

        Ok(Self {
            database_url: SecretString::from(database_url),
            otel_endpoint: lookup("OTEL_ENDPOINT"),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            schedule_enabled,
            external_api_url: lookup("EXTERNAL_API_URL")
                .unwrap_or_else(|| DEFAULT_EXTERNAL_API_URL.to_string()),
            external_api_timeout: Duration::from_millis(timeout_ms),
            instance_id: lookup("BATCH_INSTANCE_ID")
                .unwrap_or_else(|| format!("batch-{}", uuid::Uuid::new_v4().simple())),
            schedule_file: lookup("BATCH_SCHEDULE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEDULE_FILE)),
        })
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{name} must be a boolean, got {other:?}"))),
    }
}
