//! Work items and their claim lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A pending record owned by the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub branch: String,
    pub name: String,
    /// Absent amounts are processed anyway, with a warning.
    pub amount: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub status: WorkStatus,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Claim lifecycle: `Unset → Claimed → {Completed | Error}`.
///
/// `Unset` is stored as SQL NULL, which is what makes an item claimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Unset,
    Claimed,
    Completed,
    Error,
}

impl WorkStatus {
    /// Column value for this status.
    pub fn as_db(self) -> Option<&'static str> {
        match self {
            WorkStatus::Unset => None,
            WorkStatus::Claimed => Some("claimed"),
            WorkStatus::Completed => Some("completed"),
            WorkStatus::Error => Some("error"),
        }
    }

    /// Parse a nullable column value.
    pub fn from_db(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(WorkStatus::Unset),
            Some(s) => s.parse(),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Completed | WorkStatus::Error)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db().unwrap_or("unset"))
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unset" | "" => Ok(WorkStatus::Unset),
            "claimed" => Ok(WorkStatus::Claimed),
            "completed" => Ok(WorkStatus::Completed),
            "error" => Ok(WorkStatus::Error),
            _ => Err(Error::Other(format!("unknown work status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for inserting work items (seeding and tests; production rows arrive
/// from elsewhere).
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub(crate) branch: String,
    pub(crate) name: String,
    pub(crate) amount: Option<f64>,
    pub(crate) created_at: Option<DateTime<Utc>>,
}

impl NewWorkItem {
    pub fn new(branch: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            name: name.into(),
            amount: None,
            created_at: None,
        }
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Override the creation time (defaults to now at insert).
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_maps_to_null_column() {
        assert_eq!(WorkStatus::Unset.as_db(), None);
        assert_eq!(WorkStatus::from_db(None).unwrap(), WorkStatus::Unset);
    }

    #[test]
    fn status_column_values_parse_back() {
        for status in [
            WorkStatus::Claimed,
            WorkStatus::Completed,
            WorkStatus::Error,
        ] {
            assert_eq!(WorkStatus::from_db(status.as_db()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("JOB_PROCESSING".parse::<WorkStatus>().is_err());
    }

    #[test]
    fn only_completed_and_error_are_terminal() {
        assert!(!WorkStatus::Unset.is_terminal());
        assert!(!WorkStatus::Claimed.is_terminal());
        assert!(WorkStatus::Completed.is_terminal());
        assert!(WorkStatus::Error.is_terminal());
    }
}
