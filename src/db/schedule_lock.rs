//! Schedule lock leases.
//!
//! A lock row is free once `lock_until` has passed. Acquisition is a single
//! upsert guarded on that condition, so at most one holder wins per lease.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::store::ScheduleLockStore;

#[async_trait]
impl ScheduleLockStore for super::Db {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        lock_at_most_for: Duration,
    ) -> Result<bool> {
        let acquired: Option<(String,)> = sqlx::query_as(
            "INSERT INTO schedule_lock (name, lock_until, locked_at, locked_by)
             VALUES ($1, now() + make_interval(secs => $2), now(), $3)
             ON CONFLICT (name) DO UPDATE
             SET lock_until = EXCLUDED.lock_until,
                 locked_at = EXCLUDED.locked_at,
                 locked_by = EXCLUDED.locked_by
             WHERE schedule_lock.lock_until <= now()
             RETURNING name",
        )
        .bind(name)
        .bind(lock_at_most_for.as_secs_f64())
        .bind(holder)
        .fetch_optional(&self.pool)
        .await?;

        Ok(acquired.is_some())
    }

    async fn release(&self, name: &str, holder: &str, lock_at_least_for: Duration) -> Result<()> {
        sqlx::query(
            "UPDATE schedule_lock
             SET lock_until = GREATEST(locked_at + make_interval(secs => $3), now())
             WHERE name = $1 AND locked_by = $2",
        )
        .bind(name)
        .bind(holder)
        .bind(lock_at_least_for.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
