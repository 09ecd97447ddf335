//! Metric instrument factories for jobflow.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"jobflow"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for jobflow instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("jobflow")
}

/// Counter: jobs created.
/// Labels: `origin` ("direct" | "forwarded").
pub fn jobs_created() -> Counter<u64> {
    meter()
        .u64_counter("jobflow.job.created")
        .with_description("Number of jobs created")
        .build()
}

/// Counter: job status transitions.
/// Labels: `from`, `to`.
pub fn job_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("jobflow.job.state_transitions")
        .with_description("Number of job status transitions")
        .build()
}

/// Counter: approve-and-forward decisions.
/// Labels: `result` ("forwarded" | "ineligible" | "no_target").
pub fn jobs_forwarded() -> Counter<u64> {
    meter()
        .u64_counter("jobflow.job.forwarded")
        .with_description("Outcomes of approve-and-forward decisions")
        .build()
}

/// Counter: notifications the sink refused after commit.
/// Labels: `title`.
pub fn notification_delivery_failures() -> Counter<u64> {
    meter()
        .u64_counter("jobflow.notification.delivery_failures")
        .with_description("Notifications that could not be handed to the sink")
        .build()
}

/// Histogram: workflow operation duration in milliseconds.
/// Labels: `operation`, `result` ("ok" | "error").
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobflow.operation.duration_ms")
        .with_description("Workflow operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
