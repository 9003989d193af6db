//! Demo data for an empty work item table.

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::Result;
use crate::model::NewWorkItem;
use crate::store::WorkClaimStore;

pub const SAMPLE_BRANCHES: [&str; 6] = ["HN001", "HN002", "HN003", "HCM001", "HCM002", "DN001"];
pub const SAMPLE_ITEM_COUNT: i64 = 25;

/// Insert 25 sample items, oldest first, one hour apart. Does nothing when
/// the table already has rows. Returns the number inserted.
pub async fn seed_sample_items(store: &dyn WorkClaimStore) -> Result<usize> {
    let existing = store.count_all().await?;
    if existing > 0 {
        info!(existing, "work items present, skipping seed");
        return Ok(0);
    }

    let now = Utc::now();
    for i in 1..=SAMPLE_ITEM_COUNT {
        let branch = SAMPLE_BRANCHES[(i % SAMPLE_BRANCHES.len() as i64) as usize];
        let item = NewWorkItem::new(branch, format!("Transaction {i}"))
            .amount(1000.0 * i as f64 + i as f64 * 0.5)
            .created_at(now - Duration::hours(SAMPLE_ITEM_COUNT - i));
        store.insert(item).await?;
    }

    info!(count = SAMPLE_ITEM_COUNT, "seeded sample work items");
    Ok(SAMPLE_ITEM_COUNT as usize)
}
