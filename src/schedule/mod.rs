//! Cluster-wide mutual exclusion for scheduled triggers.

pub mod scheduler;

pub use scheduler::{ScheduledJob, Scheduler};

use opentelemetry::KeyValue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::store::ScheduleLockStore;
use crate::telemetry::metrics;

/// Name and hold times of one schedule lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    pub name: String,
    /// Upper bound on a lease, so a crashed holder cannot block forever.
    pub lock_at_most_for: Duration,
    /// Lower bound on a lease, so fast runs on skewed clocks do not repeat.
    pub lock_at_least_for: Duration,
}

impl LockConfig {
    pub fn new(
        name: impl Into<String>,
        lock_at_most_for: Duration,
        lock_at_least_for: Duration,
    ) -> Result<Self> {
        let name = name.into();
        if lock_at_least_for > lock_at_most_for {
            return Err(Error::Config(format!(
                "lock {name}: lock_at_least_for ({lock_at_least_for:?}) exceeds lock_at_most_for ({lock_at_most_for:?})"
            )));
        }
        Ok(Self {
            name,
            lock_at_most_for,
            lock_at_least_for,
        })
    }
}

/// Runs work only while holding a named lease in a shared store.
#[derive(Clone)]
pub struct DistributedScheduleLock {
    store: Arc<dyn ScheduleLockStore>,
    holder: String,
}

impl DistributedScheduleLock {
    /// `holder` identifies this process in the lock table.
    pub fn new(store: Arc<dyn ScheduleLockStore>, holder: impl Into<String>) -> Self {
        Self {
            store,
            holder: holder.into(),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Run `f` if the lock is free. `None` when someone else holds it or the
    /// store could not be reached.
    pub async fn run_locked<F, Fut, T>(&self, lock: &LockConfig, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let acquired = match self
            .store
            .try_acquire(&lock.name, &self.holder, lock.lock_at_most_for)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(lock = %lock.name, error = %e, "schedule lock unavailable, skipping tick");
                record_attempt(&lock.name, "error");
                return None;
            }
        };

        if !acquired {
            debug!(lock = %lock.name, "schedule lock held elsewhere, skipping tick");
            record_attempt(&lock.name, "busy");
            return None;
        }
        record_attempt(&lock.name, "acquired");

        let value = f().await;

        if let Err(e) = self
            .store
            .release(&lock.name, &self.holder, lock.lock_at_least_for)
            .await
        {
            // The lease still expires at lock_at_most_for.
            error!(lock = %lock.name, error = %e, "failed to release schedule lock");
        }
        Some(value)
    }
}

fn record_attempt(lock: &str, result: &'static str) {
    metrics::lock_acquisitions().add(
        1,
        &[
            KeyValue::new("lock", lock.to_string()),
            KeyValue::new("result", result),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_may_not_exceed_most() {
        let err = LockConfig::new("L", Duration::from_secs(1), Duration::from_secs(2));
        assert!(matches!(err, Err(Error::Config(_))));
        assert!(LockConfig::new("L", Duration::from_secs(2), Duration::from_secs(2)).is_ok());
    }
}
