//! Job and step execution span helpers.

use tracing::Span;

/// Start a span for one job run. Every line logged inside carries `cid`.
pub fn start_job_span(job: &str, correlation_id: &str) -> Span {
    tracing::info_span!(
        "job.run",
        "job.name" = job,
        cid = correlation_id,
        "job.outcome" = tracing::field::Empty,
    )
}

/// Start a span for one step execution, nested under the job span.
///
/// `step.status` is declared empty and filled in by [`record_step_status`].
pub fn start_step_span(step: &str, step_execution_id: i64) -> Span {
    tracing::info_span!(
        "step.execute",
        "step.name" = step,
        "step.execution_id" = step_execution_id,
        "step.status" = tracing::field::Empty,
    )
}

/// Record the final status of a step on its span.
pub fn record_step_status(span: &Span, status: &str) {
    span.record("step.status", status);
}

/// Record the final outcome of a job run on its span.
pub fn record_job_outcome(span: &Span, outcome: &str) {
    span.record("job.outcome", outcome);
}
