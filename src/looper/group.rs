//! Cooperative shutdown for a set of workers.

use super::{Handler, HandlerThread, WorkerStats};
use crate::error::Result;
use tracing::{info, warn};

/// Owns workers so they can be stopped together.
///
/// [`shutdown`](Self::shutdown) asks every worker to quit before joining
/// any of them, so slow workers drain in parallel. Dropping the group does
/// the same.
#[derive(Debug, Default)]
pub struct WorkerGroup {
    workers: Vec<HandlerThread>,
}

impl WorkerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a worker owned by the group.
    pub fn spawn(&mut self, name: impl Into<String>) -> Result<Handler> {
        let thread = HandlerThread::start(name)?;
        Ok(self.adopt(thread))
    }

    /// Take ownership of an already running worker.
    pub fn adopt(&mut self, thread: HandlerThread) -> Handler {
        let handler = thread.handler();
        self.workers.push(thread);
        handler
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(HandlerThread::name).collect()
    }

    /// Quit every worker safely, then join them in registration order.
    pub fn shutdown(mut self) -> Vec<(String, Result<WorkerStats>)> {
        self.stop_all()
    }

    fn stop_all(&mut self) -> Vec<(String, Result<WorkerStats>)> {
        if self.workers.is_empty() {
            return Vec::new();
        }
        info!(workers = self.workers.len(), "shutting down worker group");

        for worker in &self.workers {
            worker.quit_safely();
        }

        self.workers
            .drain(..)
            .map(|worker| {
                let name = worker.name().to_string();
                let result = worker.join();
                if let Err(ref e) = result {
                    warn!(worker = %name, "worker did not stop cleanly: {e}");
                }
                (name, result)
            })
            .collect()
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        self.stop_all();
    }
}
