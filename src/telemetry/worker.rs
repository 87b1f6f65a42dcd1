//! Worker span helpers.
//!
//! Provides span creation for message execution and lifecycle events for
//! worker threads.

use tracing::Span;

/// Start a span for running one message on a worker.
///
/// The `task.outcome` field is declared empty and can be filled via
/// [`record_task_outcome`].
pub fn start_task_span(worker: &str, seq: u64) -> Span {
    tracing::debug_span!(
        "worker.task",
        "worker.name" = worker,
        "task.seq" = seq,
        "task.outcome" = tracing::field::Empty,
    )
}

/// Record how a message finished ("ok" or "panicked").
pub fn record_task_outcome(span: &Span, outcome: &str) {
    span.record("task.outcome", outcome);
}

/// Emit a worker lifecycle event ("started", "quit", "stopped", ...).
pub fn record_worker_event(worker: &str, event: &str) {
    tracing::info!(worker = worker, event = event, "worker_lifecycle");
}
