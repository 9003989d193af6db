//! Metric instrument factories for claimbatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"claimbatch"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for claimbatch instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("claimbatch")
}

/// Counter: work items handed out by `claim`.
pub fn items_claimed() -> Counter<u64> {
    meter()
        .u64_counter("batch.work.claimed")
        .with_description("Number of work items claimed")
        .build()
}

/// Counter: work item status writes.
/// Labels: `status`.
pub fn status_updates() -> Counter<u64> {
    meter()
        .u64_counter("batch.work.status_updates")
        .with_description("Number of work item status updates")
        .build()
}

/// Counter: chunks whose sink write succeeded.
/// Labels: `step`.
pub fn chunks_committed() -> Counter<u64> {
    meter()
        .u64_counter("batch.chunk.committed")
        .with_description("Number of committed chunks")
        .build()
}

/// Counter: skipped reads, transforms and writes.
/// Labels: `step`, `stage` ("read" | "process" | "write").
pub fn skips() -> Counter<u64> {
    meter()
        .u64_counter("batch.step.skips")
        .with_description("Number of skipped failures")
        .build()
}

/// Histogram: step duration in milliseconds.
/// Labels: `step`, `status`.
pub fn step_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("batch.step.duration_ms")
        .with_description("Step execution duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: job run outcomes.
/// Labels: `job`, `outcome` ("completed" | "failed" | "stopped" | "disabled" | "schedule_disabled").
pub fn job_runs() -> Counter<u64> {
    meter()
        .u64_counter("batch.job.runs")
        .with_description("Number of job run attempts by outcome")
        .build()
}

/// Counter: schedule lock attempts.
/// Labels: `lock`, `result` ("acquired" | "busy" | "error").
pub fn lock_acquisitions() -> Counter<u64> {
    meter()
        .u64_counter("batch.schedule.lock_attempts")
        .with_description("Number of schedule lock acquisition attempts")
        .build()
}
