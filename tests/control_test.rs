//! Control surface, bundled jobs and seeding over the in-memory stores.

use async_trait::async_trait;
use claimbatch::control::JobControl;
use claimbatch::error::Error;
use claimbatch::external::ExternalApi;
use claimbatch::job::{JobStatus, RunOutcome};
use claimbatch::jobs::{SAMPLE_JOB, TRANSACTION_JOB, bundled_jobs};
use claimbatch::model::{JobConfigUpdate, JobParams, StepStatus, WorkStatus};
use claimbatch::seed::{SAMPLE_ITEM_COUNT, seed_sample_items};
use claimbatch::store::WorkClaimStore;
use claimbatch::store::memory::{MemoryJobConfigs, MemoryStepLog, MemoryWorkStore};
use std::sync::Arc;

struct AcceptAll;

#[async_trait]
impl ExternalApi for AcceptAll {
    async fn process(&self, _id: i64, _branch: &str) -> bool {
        true
    }
}

struct Fixture {
    store: Arc<MemoryWorkStore>,
    logs: Arc<MemoryStepLog>,
    control: JobControl,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryWorkStore::new());
    let logs = Arc::new(MemoryStepLog::new());
    let configs = Arc::new(MemoryJobConfigs::new());
    let jobs = bundled_jobs(store.clone(), Arc::new(AcceptAll));
    let control = JobControl::with_jobs(jobs, configs, logs.clone(), true);
    Fixture {
        store,
        logs,
        control,
    }
}

#[tokio::test]
async fn bundled_jobs_are_registered() {
    let f = fixture();
    let names: Vec<&str> = f.control.job_names().collect();
    assert_eq!(names, vec![SAMPLE_JOB, TRANSACTION_JOB]);
    assert!(matches!(f.control.gate("NOPE"), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn seed_fills_an_empty_table_once() {
    let store = MemoryWorkStore::new();

    let inserted = seed_sample_items(&store).await.unwrap();
    assert_eq!(inserted as i64, SAMPLE_ITEM_COUNT);
    assert_eq!(seed_sample_items(&store).await.unwrap(), 0);

    let items = store.snapshot().await;
    assert_eq!(items.len() as i64, SAMPLE_ITEM_COUNT);
    assert_eq!(items[0].name, "Transaction 1");
    assert_eq!(items[0].amount, Some(1000.5));
    assert!(items.windows(2).all(|w| w[0].created_at < w[1].created_at));
}

#[tokio::test]
async fn triggered_transaction_job_completes_seeded_items() {
    let f = fixture();
    seed_sample_items(f.store.as_ref()).await.unwrap();

    let outcome = f
        .control
        .trigger(TRANSACTION_JOB, JobParams::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Finished(JobStatus::Completed));
    assert_eq!(f.store.claim_sizes().await, vec![10, 10, 5, 0]);
    let done = f
        .store
        .list(Some(WorkStatus::Completed), 100)
        .await
        .unwrap();
    assert_eq!(done.len() as i64, SAMPLE_ITEM_COUNT);
}

#[tokio::test]
async fn sample_job_runs_all_three_steps() {
    let f = fixture();
    seed_sample_items(f.store.as_ref()).await.unwrap();

    let handle = f
        .control
        .trigger_async(SAMPLE_JOB, JobParams::new())
        .unwrap();
    assert_eq!(
        handle.await.unwrap(),
        RunOutcome::Finished(JobStatus::Completed)
    );

    // The tasklet leaves no result row; the two chunk steps do.
    let results = f.logs.results().await;
    let steps: Vec<&str> = results.iter().map(|r| r.job_name.as_str()).collect();
    assert_eq!(steps, vec!["TRANSACTION_PROCESSING_STEP", "SAMPLE_STEP"]);
    assert!(results.iter().all(|r| r.status == StepStatus::Completed));
    assert_eq!(results[1].row_run, 10);
    assert_eq!(results[1].total, 10);
}

#[tokio::test]
async fn config_round_trip_and_disable() {
    let f = fixture();

    assert!(matches!(
        f.control.get_config(TRANSACTION_JOB).await,
        Err(Error::NotFound(_))
    ));

    let saved = f
        .control
        .set_config(JobConfigUpdate {
            job_name: TRANSACTION_JOB.to_string(),
            enabled: false,
            params: Some(r#"{"pageSize": 3}"#.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!saved.enabled);
    assert_eq!(saved.updated_by.as_deref(), Some("SYSTEM"));

    let outcome = f
        .control
        .trigger(TRANSACTION_JOB, JobParams::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Disabled);

    let updated = f
        .control
        .update_params(TRANSACTION_JOB, Some("  ".to_string()), "API")
        .await
        .unwrap();
    assert!(updated.params.is_none());
    assert!(!updated.enabled);
}

#[tokio::test]
async fn non_object_params_are_refused() {
    let f = fixture();

    let err = f
        .control
        .update_params(TRANSACTION_JOB, Some("[1, 2]".to_string()), "API")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));

    let err = f
        .control
        .set_config(JobConfigUpdate {
            job_name: TRANSACTION_JOB.to_string(),
            enabled: true,
            params: Some("{broken".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));
}

#[tokio::test]
async fn persisted_page_size_drives_the_claims() {
    let f = fixture();
    seed_sample_items(f.store.as_ref()).await.unwrap();
    f.control
        .update_params(TRANSACTION_JOB, Some(r#"{"pageSize": 20}"#.to_string()), "API")
        .await
        .unwrap();

    f.control
        .trigger(TRANSACTION_JOB, JobParams::new())
        .await
        .unwrap();

    assert_eq!(f.store.claim_sizes().await, vec![20, 5, 0]);
}

#[tokio::test]
async fn stop_for_unknown_job_is_not_found() {
    let f = fixture();
    assert!(matches!(
        f.control.request_stop("NOPE"),
        Err(Error::NotFound(_))
    ));
    assert!(f.control.request_stop(SAMPLE_JOB).is_ok());
}
