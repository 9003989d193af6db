//! Work item processing: claim a page, ask the external service about each
//! item, mark the accepted ones completed.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::engine::{ChunkStep, Sink, Source, Step, StepError, StepHooks, Transform};
use crate::external::ExternalApi;
use crate::job::Job;
use crate::model::{JobParams, LogType, WorkItem, WorkStatus};
use crate::store::WorkClaimStore;

pub const TRANSACTION_JOB: &str = "TRANSACTION_JOB";
pub const TRANSACTION_PROCESSING_STEP: &str = "TRANSACTION_PROCESSING_STEP";

/// Items claimed per page unless `pageSize` says otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Read `pageSize` from run parameters. Accepts a positive integer or a
/// string holding one.
pub fn page_size(params: &JobParams) -> Result<usize, String> {
    match params.get("pageSize") {
        None | Some(serde_json::Value::Null) => Ok(DEFAULT_PAGE_SIZE),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| format!("pageSize must be a positive integer, got {n}")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("pageSize must be a positive integer, got {s:?}")),
        Some(other) => Err(format!("pageSize must be a positive integer, got {other}")),
    }
}

/// Source that claims work items a page at a time.
///
/// Each page is claimed in its own committed transaction before any item of
/// it is handed out. An empty claim ends the stream.
pub struct ClaimingSource {
    store: Arc<dyn WorkClaimStore>,
    page_size: usize,
    page: VecDeque<WorkItem>,
    exhausted: bool,
}

impl ClaimingSource {
    pub fn new(store: Arc<dyn WorkClaimStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            page: VecDeque::new(),
            exhausted: false,
        }
    }
}

#[async_trait]
impl Source<WorkItem> for ClaimingSource {
    async fn read(&mut self) -> Result<Option<WorkItem>, StepError> {
        if self.page.is_empty() && !self.exhausted {
            let claimed = self.store.claim(self.page_size).await?;
            if claimed.is_empty() {
                info!("no more unclaimed work items");
                self.exhausted = true;
            } else {
                info!(claimed = claimed.len(), page_size = self.page_size, "claimed page");
                self.page.extend(claimed);
            }
        }

        let item = self.page.pop_front();
        if let Some(item) = &item {
            debug!(id = item.id, branch = %item.branch, name = %item.name, "read work item");
        }
        Ok(item)
    }

    async fn count(&self) -> Result<i64, StepError> {
        let total = self.store.count_unclaimed().await?;
        info!(total, "unclaimed work items");
        Ok(total)
    }
}

/// Passes an item through when the external service accepts it.
///
/// A rejected item is marked `error` right away, in its own write, and
/// skipped.
pub struct ApiTransform {
    store: Arc<dyn WorkClaimStore>,
    api: Arc<dyn ExternalApi>,
}

impl ApiTransform {
    pub fn new(store: Arc<dyn WorkClaimStore>, api: Arc<dyn ExternalApi>) -> Self {
        Self { store, api }
    }
}

#[async_trait]
impl Transform<WorkItem, WorkItem> for ApiTransform {
    async fn process(&mut self, item: &WorkItem) -> Result<WorkItem, StepError> {
        if item.amount.is_none() {
            warn!(id = item.id, "work item has no amount");
        }

        if self.api.process(item.id, &item.branch).await {
            info!(id = item.id, branch = %item.branch, "external api accepted work item");
            return Ok(item.clone());
        }

        error!(id = item.id, branch = %item.branch, "external api call failed");
        if let Err(e) = self.store.update_status(item.id, WorkStatus::Error).await {
            error!(id = item.id, error = %e, "failed to mark work item as error");
        }
        Err(StepError::Transform(format!(
            "External API call failed for work item id={}",
            item.id
        )))
    }
}

/// Marks a chunk completed in one transaction. On failure, marks the whole
/// chunk `error` on a best-effort basis.
pub struct CompletingSink {
    store: Arc<dyn WorkClaimStore>,
}

impl CompletingSink {
    pub fn new(store: Arc<dyn WorkClaimStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Sink<WorkItem> for CompletingSink {
    async fn write(&mut self, chunk: &[WorkItem]) -> Result<(), StepError> {
        let ids: Vec<i64> = chunk.iter().map(|item| item.id).collect();

        match self
            .store
            .update_status_many(&ids, WorkStatus::Completed)
            .await
        {
            Ok(()) => {
                info!(count = ids.len(), "marked work items completed");
                Ok(())
            }
            Err(e) => {
                error!(count = ids.len(), error = %e, "failed to mark work items completed");
                match self.store.update_status_many(&ids, WorkStatus::Error).await {
                    Ok(()) => {
                        info!(count = ids.len(), "marked work items error after write failure")
                    }
                    Err(mark) => {
                        error!(count = ids.len(), error = %mark, "failed to mark work items error")
                    }
                }
                Err(StepError::Sink(e.to_string()))
            }
        }
    }
}

/// The claim → external api → complete step.
pub fn transaction_step(
    store: Arc<dyn WorkClaimStore>,
    api: Arc<dyn ExternalApi>,
    page_size: usize,
) -> ChunkStep<WorkItem, WorkItem> {
    let hooks = StepHooks::new()
        .before_step(move |exec| {
            exec.log(
                LogType::Info,
                "Transaction processing step started",
                Some(format!("Will process work items in pages of {page_size}")),
            );
        })
        .after_step(|exec| {
            let note = format!("Processed {} work items", exec.processed);
            exec.log(LogType::Info, "Transaction processing step completed", Some(note));
        });

    ChunkStep::new(
        TRANSACTION_PROCESSING_STEP,
        ClaimingSource::new(Arc::clone(&store), page_size),
        ApiTransform::new(Arc::clone(&store), api),
        CompletingSink::new(store),
    )
    .start_message("Starting transaction processing step - processing claimed work items")
    .hooks(hooks)
}

/// Single-step job around [`transaction_step`].
pub struct TransactionJob {
    store: Arc<dyn WorkClaimStore>,
    api: Arc<dyn ExternalApi>,
}

impl TransactionJob {
    pub fn new(store: Arc<dyn WorkClaimStore>, api: Arc<dyn ExternalApi>) -> Self {
        Self { store, api }
    }
}

impl Job for TransactionJob {
    fn name(&self) -> &str {
        TRANSACTION_JOB
    }

    fn validate(&self, params: &JobParams) -> Result<(), String> {
        page_size(params).map(|_| ())
    }

    fn steps(&self, params: &JobParams) -> Vec<Box<dyn Step>> {
        let page_size = page_size(params).unwrap_or(DEFAULT_PAGE_SIZE);
        vec![Box::new(transaction_step(
            Arc::clone(&self.store),
            Arc::clone(&self.api),
            page_size,
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> JobParams {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    #[test]
    fn page_size_defaults_to_ten() {
        assert_eq!(page_size(&JobParams::new()), Ok(10));
    }

    #[test]
    fn page_size_accepts_numbers_and_numeric_strings() {
        assert_eq!(page_size(&params(json!({"pageSize": 20}))), Ok(20));
        assert_eq!(page_size(&params(json!({"pageSize": "5"}))), Ok(5));
    }

    #[test]
    fn page_size_rejects_zero_and_garbage() {
        assert!(page_size(&params(json!({"pageSize": 0}))).is_err());
        assert!(page_size(&params(json!({"pageSize": "many"}))).is_err());
        assert!(page_size(&params(json!({"pageSize": [1]}))).is_err());
    }
}
