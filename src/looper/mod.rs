//! Named worker threads, each draining its own message queue.
//!
//! [`HandlerThread::start`] spawns the thread and returns the owning handle.
//! [`Handler`] is the cheap, cloneable capability used to post work. The
//! owner stops the loop and joins the thread on [`HandlerThread::join`] or
//! when dropped.

pub mod group;
mod queue;

pub use group::WorkerGroup;

use crate::error::{Error, Result};
use crate::telemetry::metrics;
use crate::telemetry::worker::{record_task_outcome, record_worker_event, start_task_span};
use opentelemetry::KeyValue;
use queue::{MessageQueue, Next, Task};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Counters reported when a worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Messages that ran, including ones that panicked.
    pub executed: u64,
    /// Messages that panicked.
    pub panicked: u64,
    /// Messages dropped by quit without running.
    pub discarded: u64,
}

struct Shared {
    name: String,
    queue: MessageQueue,
    thread_id: OnceLock<ThreadId>,
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn is_current(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }
}

/// Configures a worker before it starts.
#[derive(Debug, Clone)]
pub struct Builder {
    name: String,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    /// Stack size for the worker thread, in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Spawn the thread and return its owner.
    ///
    /// The queue exists before the thread runs, so the returned handle
    /// accepts posts immediately.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] for an empty name or one containing NUL,
    /// [`Error::Spawn`] if the OS refuses a new thread.
    pub fn start(self) -> Result<HandlerThread> {
        if self.name.is_empty() || self.name.contains('\0') {
            return Err(Error::InvalidName);
        }

        let shared = Arc::new(Shared {
            name: self.name.clone(),
            queue: MessageQueue::new(),
            thread_id: OnceLock::new(),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let mut builder = thread::Builder::new().name(self.name);
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        let worker = Arc::clone(&shared);
        let thread = builder.spawn(move || run_loop(&worker))?;
        let thread_id = thread.thread().id();
        let _ = shared.thread_id.set(thread_id);

        metrics::worker_started().add(1, &[KeyValue::new("worker", shared.name.clone())]);
        record_worker_event(&shared.name, "started");

        Ok(HandlerThread {
            shared,
            thread_id,
            thread: Some(thread),
        })
    }
}

/// Owner of one worker thread.
///
/// Dropping it quits the loop safely and joins the thread.
pub struct HandlerThread {
    shared: Arc<Shared>,
    thread_id: ThreadId,
    thread: Option<JoinHandle<WorkerStats>>,
}

impl HandlerThread {
    /// Start a worker named `name` with default settings.
    pub fn start(name: impl Into<String>) -> Result<Self> {
        Builder::new(name).start()
    }

    pub fn builder(name: impl Into<String>) -> Builder {
        Builder::new(name)
    }

    /// A new handle for posting to this worker.
    pub fn handler(&self) -> Handler {
        Handler {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Messages waiting in the queue, due or not.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_quitting(&self) -> bool {
        self.shared.queue.is_quitting()
    }

    /// Stop the loop, dropping everything still queued.
    ///
    /// The message currently running, if any, finishes first.
    pub fn quit(&self) {
        debug!(worker = %self.shared.name, "quit requested");
        self.shared.queue.quit(false);
    }

    /// Stop the loop once every message already due has run.
    pub fn quit_safely(&self) {
        debug!(worker = %self.shared.name, "safe quit requested");
        self.shared.queue.quit(true);
    }

    /// Quit safely and wait for the thread to exit.
    ///
    /// # Errors
    ///
    /// [`Error::WorkerPanicked`] if the thread died outside a message.
    pub fn join(mut self) -> Result<WorkerStats> {
        self.quit_safely();
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<WorkerStats> {
        let Some(thread) = self.thread.take() else {
            return Ok(WorkerStats::default());
        };
        thread
            .join()
            .map_err(|_| Error::WorkerPanicked(self.shared.name.clone()))
    }
}

impl Drop for HandlerThread {
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }
        self.quit_safely();
        // A message that drops its own owner cannot join itself.
        if self.shared.is_current() {
            drop(self.thread.take());
            return;
        }
        if let Err(e) = self.join_thread() {
            warn!(worker = %self.shared.name, "worker did not stop cleanly: {e}");
        }
    }
}

impl std::fmt::Debug for HandlerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerThread")
            .field("name", &self.shared.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

/// Posts work to one worker's queue.
#[derive(Clone)]
pub struct Handler {
    shared: Arc<Shared>,
}

impl Handler {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// True when called from the worker's own thread.
    pub fn is_current(&self) -> bool {
        self.shared.is_current()
    }

    /// Run `f` on the worker as soon as possible.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f), None)
    }

    /// Run `f` on the worker no earlier than `delay` from now.
    pub fn post_delayed<F>(&self, f: F, delay: Duration) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f), Some(deadline_after(delay)))
    }

    /// Run `f` on the worker no earlier than `when`.
    ///
    /// An instant already in the past is treated as "now".
    pub fn post_at<F>(&self, f: F, when: Instant) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f), Some(when))
    }

    /// Run `f` on the worker and block until it returns.
    ///
    /// On the worker's own thread `f` runs inline.
    ///
    /// # Errors
    ///
    /// [`Error::Quit`] if the worker quit before running `f`,
    /// [`Error::TaskPanicked`] if `f` panicked.
    pub fn run_sync<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|_| Error::TaskPanicked(self.shared.name.clone()));
        }

        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.post(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = tx.send(Ok(value));
            }
            Err(payload) => {
                let _ = tx.send(Err(()));
                panic::resume_unwind(payload);
            }
        })?;

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(())) => Err(Error::TaskPanicked(self.shared.name.clone())),
            Err(_) => Err(Error::Quit(self.shared.name.clone())),
        }
    }

    /// Run `f` on the worker, completing when it returns.
    ///
    /// `f` is posted immediately, not when the future is first polled.
    pub fn run_async<F, R>(&self, f: F) -> impl Future<Output = Result<R>> + Send + 'static
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let posted = self.post(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = tx.send(Ok(value));
            }
            Err(payload) => {
                let _ = tx.send(Err(()));
                panic::resume_unwind(payload);
            }
        });
        let name = self.shared.name.clone();

        async move {
            posted?;
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(())) => Err(Error::TaskPanicked(name)),
                Err(_) => Err(Error::Quit(name)),
            }
        }
    }

    fn enqueue(&self, task: Task, when: Option<Instant>) -> Result<()> {
        match self.shared.queue.enqueue(task, when) {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::Quit(self.shared.name.clone())),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.shared.name)
            .finish()
    }
}

/// `now + delay`, or a point roughly 30 years out when that overflows.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| far_future(now))
}

fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}

fn run_loop(shared: &Shared) -> WorkerStats {
    let labels = [KeyValue::new("worker", shared.name.clone())];
    let executed = metrics::task_executed();
    let panicked = metrics::task_panicked();
    let duration = metrics::task_duration_ms();

    info!(worker = %shared.name, "worker loop running");

    let discarded = loop {
        let message = match shared.queue.next() {
            Next::Run(message) => message,
            Next::Exit { discarded } => break discarded,
        };

        let span = start_task_span(&shared.name, message.seq);
        let _entered = span.enter();
        let start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(message.task));

        duration.record(start.elapsed().as_secs_f64() * 1000.0, &labels);
        executed.add(1, &labels);
        shared.executed.fetch_add(1, Ordering::Relaxed);

        if outcome.is_ok() {
            record_task_outcome(&span, "ok");
        } else {
            record_task_outcome(&span, "panicked");
            panicked.add(1, &labels);
            shared.panicked.fetch_add(1, Ordering::Relaxed);
            error!(worker = %shared.name, seq = message.seq, "message panicked");
        }
    };

    let stats = WorkerStats {
        executed: shared.executed.load(Ordering::Relaxed),
        panicked: shared.panicked.load(Ordering::Relaxed),
        discarded,
    };
    if discarded > 0 {
        warn!(worker = %shared.name, discarded, "pending messages dropped on quit");
    }
    record_worker_event(&shared.name, "stopped");
    stats
}
