//! Storage seams used by the engine, the run gate and the scheduler.
//!
//! [`crate::db::Db`] implements every trait against Postgres;
//! [`memory`] provides process-local equivalents for tests and demos.

pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::model::{
    JobConfig, JobConfigUpdate, NewWorkItem, StepLogEntry, StepResult, WorkItem, WorkStatus,
};

/// Contention-safe access to shared work items.
#[async_trait]
pub trait WorkClaimStore: Send + Sync {
    /// Atomically take up to `limit` unset items, oldest first (then by id),
    /// and mark them claimed.
    ///
    /// Runs as its own committed unit of work: the claim stays visible no
    /// matter what later happens to the items. Concurrent callers never block
    /// each other and never receive overlapping sets.
    async fn claim(&self, limit: usize) -> Result<Vec<WorkItem>>;

    /// Set one item's status. Idempotent, last write wins.
    async fn update_status(&self, id: i64, status: WorkStatus) -> Result<()>;

    /// Set the status of many items in one transaction. No-op on empty input.
    async fn update_status_many(&self, ids: &[i64], status: WorkStatus) -> Result<()>;

    /// Number of unset items. Approximate under concurrent inserts.
    async fn count_unclaimed(&self) -> Result<i64>;

    async fn count_all(&self) -> Result<i64>;

    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem>;

    async fn get(&self, id: i64) -> Result<WorkItem>;

    /// List items oldest first, optionally filtered by status.
    async fn list(&self, status: Option<WorkStatus>, limit: i64) -> Result<Vec<WorkItem>>;
}

/// Append-only step log plus per-step result records.
#[async_trait]
pub trait StepLogSink: Send + Sync {
    async fn append(&self, entry: StepLogEntry) -> Result<()>;

    async fn record_result(&self, result: StepResult) -> Result<()>;

    /// Allocate an id for a job or step execution.
    async fn next_execution_id(&self) -> Result<i64>;

    /// Most recent step results, newest first.
    async fn recent_results(&self, limit: i64) -> Result<Vec<StepResult>>;
}

/// Persisted job configuration.
#[async_trait]
pub trait JobConfigStore: Send + Sync {
    async fn find(&self, job_name: &str) -> Result<Option<JobConfig>>;

    /// Create or replace description, switch and parameters.
    async fn save(&self, update: JobConfigUpdate) -> Result<JobConfig>;

    /// Replace only the parameter document. A missing row is created enabled.
    async fn update_params(
        &self,
        job_name: &str,
        params: Option<String>,
        updated_by: &str,
    ) -> Result<JobConfig>;
}

/// Name-keyed lease rows backing the distributed schedule lock.
#[async_trait]
pub trait ScheduleLockStore: Send + Sync {
    /// Take the lock if it is free or its lease ran out. The lease lasts
    /// `lock_at_most_for`.
    async fn try_acquire(&self, name: &str, holder: &str, lock_at_most_for: Duration)
    -> Result<bool>;

    /// Give the lock back, keeping it held until `locked_at + lock_at_least_for`.
    async fn release(&self, name: &str, holder: &str, lock_at_least_for: Duration) -> Result<()>;
}
