//! Metric instrument factories for looper-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created from the `"looper-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for looper-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("looper-rs")
}

/// Counter: worker threads started.
/// Labels: `worker`.
pub fn worker_started() -> Counter<u64> {
    meter()
        .u64_counter("looper.worker.started")
        .with_description("Number of worker threads started")
        .build()
}

/// Counter: messages run to completion.
/// Labels: `worker`.
pub fn task_executed() -> Counter<u64> {
    meter()
        .u64_counter("looper.task.executed")
        .with_description("Number of messages executed")
        .build()
}

/// Counter: messages that panicked.
/// Labels: `worker`.
pub fn task_panicked() -> Counter<u64> {
    meter()
        .u64_counter("looper.task.panicked")
        .with_description("Number of messages that panicked")
        .build()
}

/// Histogram: message run time in milliseconds.
/// Labels: `worker`.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("looper.task.duration_ms")
        .with_description("Message execution time in milliseconds")
        .with_unit("ms")
        .build()
}
