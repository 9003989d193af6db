//! Process-local store implementations.
//!
//! Each store serializes access through one async mutex, which gives the same
//! atomicity the Postgres statements provide: a claim selects and marks in one
//! critical section, and a multi-id status update applies to all ids or none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{JobConfigStore, ScheduleLockStore, StepLogSink, WorkClaimStore};
use crate::error::{Error, Result};
use crate::model::{
    JobConfig, JobConfigUpdate, NewWorkItem, StepLogEntry, StepResult, WorkItem, WorkStatus,
};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WorkState {
    items: BTreeMap<i64, WorkItem>,
    next_id: i64,
    poisoned: HashSet<i64>,
    claim_sizes: Vec<usize>,
}

/// In-memory [`WorkClaimStore`].
#[derive(Default)]
pub struct MemoryWorkStore {
    state: Mutex<WorkState>,
}

impl MemoryWorkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every status update touching `id` fail.
    pub async fn poison(&self, id: i64) {
        self.state.lock().await.poisoned.insert(id);
    }

    /// Sizes returned by each `claim` call so far, in call order.
    pub async fn claim_sizes(&self) -> Vec<usize> {
        self.state.lock().await.claim_sizes.clone()
    }

    /// Snapshot of all items ordered by id.
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        self.state.lock().await.items.values().cloned().collect()
    }
}

#[async_trait]
impl WorkClaimStore for MemoryWorkStore {
    async fn claim(&self, limit: usize) -> Result<Vec<WorkItem>> {
        let mut state = self.state.lock().await;

        let mut candidates: Vec<(DateTime<Utc>, i64)> = state
            .items
            .values()
            .filter(|item| item.status == WorkStatus::Unset)
            .map(|item| (item.created_at, item.id))
            .collect();
        candidates.sort();
        candidates.truncate(limit);

        let mut claimed = Vec::with_capacity(candidates.len());
        for (_, id) in candidates {
            if let Some(item) = state.items.get_mut(&id) {
                item.status = WorkStatus::Claimed;
                claimed.push(item.clone());
            }
        }

        state.claim_sizes.push(claimed.len());
        Ok(claimed)
    }

    async fn update_status(&self, id: i64, status: WorkStatus) -> Result<()> {
        self.update_status_many(&[id], status).await
    }

    async fn update_status_many(&self, ids: &[i64], status: WorkStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;

        if let Some(id) = ids.iter().find(|id| state.poisoned.contains(*id)) {
            return Err(Error::Other(format!("update rejected for poisoned item {id}")));
        }

        for id in ids {
            if let Some(item) = state.items.get_mut(id) {
                item.status = status;
            }
        }
        Ok(())
    }

    async fn count_unclaimed(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| item.status == WorkStatus::Unset)
            .count() as i64)
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.state.lock().await.items.len() as i64)
    }

    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let item = WorkItem {
            id: state.next_id,
            branch: new.branch,
            name: new.name,
            amount: new.amount,
            created_at: new.created_at.unwrap_or_else(Utc::now),
            status: WorkStatus::Unset,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: i64) -> Result<WorkItem> {
        self.state
            .lock()
            .await
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }

    async fn list(&self, status: Option<WorkStatus>, limit: i64) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<WorkItem> = state
            .items
            .values()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Step log
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LogState {
    entries: Vec<StepLogEntry>,
    results: Vec<StepResult>,
    next_execution_id: i64,
}

/// In-memory [`StepLogSink`].
#[derive(Default)]
pub struct MemoryStepLog {
    state: Mutex<LogState>,
}

impl MemoryStepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<StepLogEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn results(&self) -> Vec<StepResult> {
        self.state.lock().await.results.clone()
    }
}

#[async_trait]
impl StepLogSink for MemoryStepLog {
    async fn append(&self, entry: StepLogEntry) -> Result<()> {
        self.state.lock().await.entries.push(entry);
        Ok(())
    }

    async fn record_result(&self, result: StepResult) -> Result<()> {
        self.state.lock().await.results.push(result);
        Ok(())
    }

    async fn next_execution_id(&self) -> Result<i64> {
        let mut state = self.state.lock().await;
        state.next_execution_id += 1;
        Ok(state.next_execution_id)
    }

    async fn recent_results(&self, limit: i64) -> Result<Vec<StepResult>> {
        let state = self.state.lock().await;
        Ok(state
            .results
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Job configs
// ---------------------------------------------------------------------------

/// In-memory [`JobConfigStore`].
#[derive(Default)]
pub struct MemoryJobConfigs {
    configs: Mutex<HashMap<String, JobConfig>>,
}

impl MemoryJobConfigs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobConfigStore for MemoryJobConfigs {
    async fn find(&self, job_name: &str) -> Result<Option<JobConfig>> {
        Ok(self.configs.lock().await.get(job_name).cloned())
    }

    async fn save(&self, update: JobConfigUpdate) -> Result<JobConfig> {
        let now = Utc::now();
        let by = update.updated_by.unwrap_or_else(|| "SYSTEM".to_string());
        let mut configs = self.configs.lock().await;

        let config = configs
            .entry(update.job_name.clone())
            .or_insert_with(|| JobConfig {
                job_name: update.job_name.clone(),
                description: None,
                enabled: false,
                params: None,
                created_by: Some(by.clone()),
                created_date: Some(now),
                updated_by: None,
                updated_date: None,
            });
        config.description = update.description;
        config.enabled = update.enabled;
        config.params = update.params;
        config.updated_by = Some(by);
        config.updated_date = Some(now);
        Ok(config.clone())
    }

    async fn update_params(
        &self,
        job_name: &str,
        params: Option<String>,
        updated_by: &str,
    ) -> Result<JobConfig> {
        let now = Utc::now();
        let mut configs = self.configs.lock().await;

        let config = configs
            .entry(job_name.to_string())
            .or_insert_with(|| JobConfig {
                job_name: job_name.to_string(),
                description: None,
                enabled: true,
                params: None,
                created_by: Some(updated_by.to_string()),
                created_date: Some(now),
                updated_by: None,
                updated_date: None,
            });
        config.params = params;
        config.updated_by = Some(updated_by.to_string());
        config.updated_date = Some(now);
        Ok(config.clone())
    }
}

// ---------------------------------------------------------------------------
// Schedule locks
// ---------------------------------------------------------------------------

struct LockRow {
    lock_until: DateTime<Utc>,
    locked_at: DateTime<Utc>,
    locked_by: String,
}

/// In-memory [`ScheduleLockStore`]. Only excludes holders within one process.
#[derive(Default)]
pub struct MemoryScheduleLocks {
    rows: Mutex<HashMap<String, LockRow>>,
}

impl MemoryScheduleLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lease(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| Error::Config(format!("lock duration out of range: {e}")))
}

#[async_trait]
impl ScheduleLockStore for MemoryScheduleLocks {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        lock_at_most_for: Duration,
    ) -> Result<bool> {
        let now = Utc::now();
        let until = now + lease(lock_at_most_for)?;
        let mut rows = self.rows.lock().await;

        if let Some(row) = rows.get(name) {
            if row.lock_until > now {
                return Ok(false);
            }
        }
        rows.insert(
            name.to_string(),
            LockRow {
                lock_until: until,
                locked_at: now,
                locked_by: holder.to_string(),
            },
        );
        Ok(true)
    }

    async fn release(&self, name: &str, holder: &str, lock_at_least_for: Duration) -> Result<()> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;

        if let Some(row) = rows.get_mut(name) {
            if row.locked_by == holder {
                row.lock_until = (row.locked_at + lease(lock_at_least_for)?).max(now);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poisoned_id_fails_whole_batch() {
        let store = MemoryWorkStore::new();
        let a = store.insert(NewWorkItem::new("HN001", "a")).await.unwrap();
        let b = store.insert(NewWorkItem::new("HN001", "b")).await.unwrap();
        store.poison(b.id).await;

        let result = store
            .update_status_many(&[a.id, b.id], WorkStatus::Completed)
            .await;

        assert!(result.is_err());
        assert_eq!(store.get(a.id).await.unwrap().status, WorkStatus::Unset);
    }

    #[tokio::test]
    async fn update_params_creates_enabled_row() {
        let configs = MemoryJobConfigs::new();
        let config = configs
            .update_params("J", Some(r#"{"pageSize":20}"#.into()), "API")
            .await
            .unwrap();
        assert!(config.enabled);
        assert_eq!(config.created_by.as_deref(), Some("API"));
    }
}
