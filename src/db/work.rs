//! Work item operations: skip-locked claiming and status tracking.

use async_trait::async_trait;
use opentelemetry::KeyValue;

use crate::error::{Error, Result};
use crate::model::work::*;
use crate::store::WorkClaimStore;
use crate::telemetry::metrics;

const ITEM_COLUMNS: &str = "id, branch, name, amount, create_date, status";

#[async_trait]
impl WorkClaimStore for super::Db {
    async fn claim(&self, limit: usize) -> Result<Vec<WorkItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Rows locked by a concurrent claimer are skipped, not waited on, and
        // the status flip commits before anything is handed back.
        let mut tx = self.pool.begin().await.map_err(claim_error)?;
        let rows: Vec<WorkItemRow> = sqlx::query_as(
            "WITH picked AS (
                 SELECT id FROM work_items
                 WHERE status IS NULL
                 ORDER BY create_date ASC, id ASC
                 LIMIT $1
                 FOR UPDATE SKIP LOCKED
             )
             UPDATE work_items w SET status = 'claimed'
             FROM picked
             WHERE w.id = picked.id
             RETURNING w.id, w.branch, w.name, w.amount, w.create_date, w.status",
        )
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(claim_error)?;
        tx.commit().await.map_err(claim_error)?;

        // RETURNING order is unspecified.
        let mut items = rows
            .into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect::<Result<Vec<_>>>()?;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        metrics::items_claimed().add(items.len() as u64, &[]);
        tracing::debug!(requested = limit, claimed = items.len(), "claimed work items");
        Ok(items)
    }

    async fn update_status(&self, id: i64, status: WorkStatus) -> Result<()> {
        sqlx::query("UPDATE work_items SET status = $1 WHERE id = $2")
            .bind(status.as_db())
            .bind(id)
            .execute(&self.pool)
            .await?;

        metrics::status_updates().add(1, &[KeyValue::new("status", status.to_string())]);
        Ok(())
    }

    async fn update_status_many(&self, ids: &[i64], status: WorkStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE work_items SET status = $1 WHERE id = ANY($2)")
            .bind(status.as_db())
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        metrics::status_updates().add(
            ids.len() as u64,
            &[KeyValue::new("status", status.to_string())],
        );
        Ok(())
    }

    async fn count_unclaimed(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM work_items WHERE status IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_all(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM work_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem> {
        let row: WorkItemRow = sqlx::query_as(&format!(
            "INSERT INTO work_items (branch, name, amount, create_date)
             VALUES ($1, $2, $3, COALESCE($4, now()))
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&new.branch)
        .bind(&new.name)
        .bind(new.amount)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into_work_item()
    }

    async fn get(&self, id: i64) -> Result<WorkItem> {
        let row: Option<WorkItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM work_items WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .try_into_work_item()
    }

    async fn list(&self, status: Option<WorkStatus>, limit: i64) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items
             WHERE ($1::boolean = FALSE OR status IS NOT DISTINCT FROM $2::text)
             ORDER BY create_date ASC, id ASC
             LIMIT $3"
        ))
        .bind(status.is_some())
        .bind(status.and_then(WorkStatus::as_db))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }
}

fn claim_error(e: sqlx::Error) -> Error {
    Error::Claim(e.to_string())
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: i64,
    branch: String,
    name: String,
    amount: Option<f64>,
    create_date: chrono::DateTime<chrono::Utc>,
    status: Option<String>,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: self.id,
            branch: self.branch,
            name: self.name,
            amount: self.amount,
            created_at: self.create_date,
            status: WorkStatus::from_db(self.status.as_deref())?,
        })
    }
}
