//! Schedule lock leases and the fixed-delay scheduler.

use async_trait::async_trait;
use claimbatch::engine::{RunContext, Step, StepError, Tasklet, TaskletStep};
use claimbatch::job::{Job, JobRunGate};
use claimbatch::model::JobParams;
use claimbatch::schedule::{DistributedScheduleLock, LockConfig, ScheduledJob, Scheduler};
use claimbatch::store::ScheduleLockStore;
use claimbatch::store::memory::{MemoryJobConfigs, MemoryScheduleLocks, MemoryStepLog};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn lock(name: &str, most_ms: u64, least_ms: u64) -> LockConfig {
    LockConfig::new(
        name,
        Duration::from_millis(most_ms),
        Duration::from_millis(least_ms),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Store leases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn held_lock_refuses_other_holders() {
    let locks = MemoryScheduleLocks::new();

    assert!(locks.try_acquire("L", "a", Duration::from_secs(60)).await.unwrap());
    assert!(!locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
    assert!(!locks.try_acquire("L", "a", Duration::from_secs(60)).await.unwrap());
    assert!(locks.try_acquire("OTHER", "b", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn release_without_minimum_frees_the_lock() {
    let locks = MemoryScheduleLocks::new();
    locks.try_acquire("L", "a", Duration::from_secs(60)).await.unwrap();

    locks.release("L", "a", Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn release_keeps_the_minimum_hold() {
    let locks = MemoryScheduleLocks::new();
    locks.try_acquire("L", "a", Duration::from_secs(60)).await.unwrap();

    locks.release("L", "a", Duration::from_secs(30)).await.unwrap();

    assert!(!locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn release_by_a_stranger_is_ignored() {
    let locks = MemoryScheduleLocks::new();
    locks.try_acquire("L", "a", Duration::from_secs(60)).await.unwrap();

    locks.release("L", "b", Duration::ZERO).await.unwrap();

    assert!(!locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn crashed_holder_expires_after_the_maximum() {
    let locks = MemoryScheduleLocks::new();
    locks.try_acquire("L", "a", Duration::from_millis(50)).await.unwrap();

    assert!(!locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(locks.try_acquire("L", "b", Duration::from_secs(60)).await.unwrap());
}

// ---------------------------------------------------------------------------
// run_locked
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_one_holder_runs_per_lease() {
    let store = Arc::new(MemoryScheduleLocks::new());
    let config = lock("JOB_SCHEDULER_LOCK", 60_000, 60_000);
    let runs = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..5 {
        let lock = DistributedScheduleLock::new(store.clone(), format!("node-{i}"));
        let config = config.clone();
        let runs = Arc::clone(&runs);
        handles.push(tokio::spawn(async move {
            lock.run_locked(&config, || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
            .await
        }));
    }

    let mut ran = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            ran += 1;
        }
    }
    assert_eq!(ran, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Still held for lock_at_least_for after the fast run.
    let late = DistributedScheduleLock::new(store, "late");
    assert!(late.run_locked(&config, || async {}).await.is_none());
}

#[tokio::test]
async fn run_locked_returns_the_value_and_releases() {
    let store = Arc::new(MemoryScheduleLocks::new());
    let config = lock("L", 60_000, 0);
    let a = DistributedScheduleLock::new(store.clone(), "a");
    let b = DistributedScheduleLock::new(store, "b");

    assert_eq!(a.run_locked(&config, || async { 42 }).await, Some(42));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(b.run_locked(&config, || async { 7 }).await, Some(7));
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Tick(Arc<AtomicUsize>);

#[async_trait]
impl Tasklet for Tick {
    async fn run(&mut self, _ctx: &RunContext) -> Result<(), StepError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TickJob(Arc<AtomicUsize>);

impl Job for TickJob {
    fn name(&self) -> &str {
        "TICK_JOB"
    }

    fn steps(&self, _params: &JobParams) -> Vec<Box<dyn Step>> {
        vec![Box::new(TaskletStep::new("TICK", Tick(Arc::clone(&self.0))))]
    }
}

fn tick_gate(ticks: &Arc<AtomicUsize>, schedule_enabled: bool) -> Arc<JobRunGate> {
    Arc::new(
        JobRunGate::new(
            Arc::new(TickJob(Arc::clone(ticks))),
            Arc::new(MemoryJobConfigs::new()),
            Arc::new(MemoryStepLog::new()),
        )
        .with_schedule_enabled(schedule_enabled),
    )
}

#[tokio::test]
async fn scheduler_ticks_until_shut_down() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let locks = DistributedScheduleLock::new(Arc::new(MemoryScheduleLocks::new()), "node-1");
    let mut scheduler = Scheduler::new(locks);
    scheduler.add(ScheduledJob {
        gate: tick_gate(&ticks, true),
        interval: Duration::from_millis(10),
        lock: lock("TICK_JOB_SCHEDULER_LOCK", 60_000, 0),
        params: JobParams::new(),
    });
    let scheduler = Arc::new(scheduler);

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::time::sleep(Duration::from_millis(120)).await;
    scheduler.shutdown();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();

    let seen = ticks.load(Ordering::SeqCst);
    assert!(seen >= 2, "expected repeated ticks, saw {seen}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
}

#[tokio::test]
async fn disabled_schedule_never_runs_the_job() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let locks = DistributedScheduleLock::new(Arc::new(MemoryScheduleLocks::new()), "node-1");
    let mut scheduler = Scheduler::new(locks);
    scheduler.add(ScheduledJob {
        gate: tick_gate(&ticks, false),
        interval: Duration::from_millis(10),
        lock: lock("TICK_JOB_SCHEDULER_LOCK", 60_000, 0),
        params: JobParams::new(),
    });
    let scheduler = Arc::new(scheduler);

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    scheduler.shutdown();
    runner.await.unwrap();

    assert_eq!(ticks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_before_run_exits_immediately() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let locks = DistributedScheduleLock::new(Arc::new(MemoryScheduleLocks::new()), "node-1");
    let mut scheduler = Scheduler::new(locks);
    scheduler.add(ScheduledJob {
        gate: tick_gate(&ticks, true),
        interval: Duration::from_secs(3600),
        lock: lock("TICK_JOB_SCHEDULER_LOCK", 60_000, 0),
        params: JobParams::new(),
    });
    assert_eq!(scheduler.jobs().len(), 1);

    scheduler.shutdown();
    tokio::time::timeout(Duration::from_secs(1), scheduler.run())
        .await
        .unwrap();
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
}
