//! Work claiming against the in-memory store.

use chrono::{Duration, Utc};
use claimbatch::model::{NewWorkItem, WorkStatus};
use claimbatch::store::WorkClaimStore;
use claimbatch::store::memory::MemoryWorkStore;
use std::collections::HashSet;
use std::sync::Arc;

async fn store_with(n: i64) -> Arc<MemoryWorkStore> {
    let store = Arc::new(MemoryWorkStore::new());
    let base = Utc::now() - Duration::hours(n);
    for i in 1..=n {
        store
            .insert(
                NewWorkItem::new("HN001", format!("item {i}"))
                    .amount(i as f64)
                    .created_at(base + Duration::hours(i)),
            )
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn concurrent_claimers_get_disjoint_sets() {
    let store = store_with(100).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            loop {
                let batch = store.claim(7).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                mine.extend(batch.into_iter().map(|item| item.id));
                tokio::task::yield_now().await;
            }
            mine
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "item {id} claimed twice");
        }
    }
    assert_eq!(seen.len(), 100);
    assert_eq!(store.count_unclaimed().await.unwrap(), 0);
}

#[tokio::test]
async fn claims_drain_oldest_first_in_pages() {
    let store = store_with(25).await;

    let first = store.claim(10).await.unwrap();
    let second = store.claim(10).await.unwrap();
    let third = store.claim(10).await.unwrap();
    let fourth = store.claim(10).await.unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 10);
    assert_eq!(third.len(), 5);
    assert!(fourth.is_empty());

    let ids: Vec<i64> = first.iter().map(|item| item.id).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    assert!(first.iter().all(|item| item.status == WorkStatus::Claimed));
}

#[tokio::test]
async fn equal_timestamps_fall_back_to_id_order() {
    let store = MemoryWorkStore::new();
    let at = Utc::now();
    for name in ["c", "a", "b"] {
        store
            .insert(NewWorkItem::new("HN001", name).created_at(at))
            .await
            .unwrap();
    }

    let claimed = store.claim(2).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn zero_limit_claims_nothing() {
    let store = store_with(3).await;

    assert!(store.claim(0).await.unwrap().is_empty());
    assert_eq!(store.count_unclaimed().await.unwrap(), 3);
}

#[tokio::test]
async fn status_updates_are_idempotent() {
    let store = store_with(2).await;
    let claimed = store.claim(2).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|item| item.id).collect();

    store
        .update_status_many(&ids, WorkStatus::Completed)
        .await
        .unwrap();
    store
        .update_status_many(&ids, WorkStatus::Completed)
        .await
        .unwrap();
    store.update_status_many(&[], WorkStatus::Error).await.unwrap();

    for id in ids {
        assert_eq!(store.get(id).await.unwrap().status, WorkStatus::Completed);
    }
}

#[tokio::test]
async fn claim_survives_a_failed_follow_up_write() {
    let store = store_with(3).await;
    let claimed = store.claim(3).await.unwrap();
    let ids: Vec<i64> = claimed.iter().map(|item| item.id).collect();

    store.poison(ids[1]).await;
    assert!(
        store
            .update_status_many(&ids, WorkStatus::Completed)
            .await
            .is_err()
    );

    // Nothing rolled back to unset, nothing half-completed.
    for id in ids {
        assert_eq!(store.get(id).await.unwrap().status, WorkStatus::Claimed);
    }
    assert!(store.claim(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_by_status() {
    let store = store_with(5).await;
    store.claim(2).await.unwrap();

    let unset = store.list(Some(WorkStatus::Unset), 100).await.unwrap();
    let claimed = store.list(Some(WorkStatus::Claimed), 100).await.unwrap();
    let all = store.list(None, 3).await.unwrap();

    assert_eq!(unset.len(), 3);
    assert_eq!(claimed.len(), 2);
    assert_eq!(all.len(), 3);
}
