//! Workflow operation span helpers.
//!
//! Provides span creation and state-transition recording for jobs moving
//! through the review lifecycle.

use tracing::Span;

use crate::model::{JobId, JobStatus};

/// Start a span for one workflow operation on a job.
///
/// The `job.status` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_job_span(operation: &str, job_id: JobId) -> Span {
    tracing::info_span!(
        "job.workflow",
        "job.operation" = operation,
        "job.id" = %job_id.0,
        "job.status" = tracing::field::Empty,
    )
}

/// Record a state transition event on the given span.
///
/// Emits a tracing `info` event scoped to the span and stores the new
/// status in its `job.status` field.
pub fn record_state_transition(span: &Span, from: JobStatus, to: JobStatus) {
    span.record("job.status", to.as_str());
    span.in_scope(|| {
        tracing::info!(from = from.as_str(), to = to.as_str(), "state_transition");
    });
}
