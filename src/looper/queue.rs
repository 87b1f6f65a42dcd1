//! Time-ordered message queue backing a single worker.
//!
//! Messages are ordered by due time, then by sequence number, so messages
//! due at the same instant run in the order they were posted.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct Message {
    pub when: Instant,
    pub seq: u64,
    pub task: Task,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for Message {}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Message {
    // Reversed: BinaryHeap is a max-heap and we want the earliest first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy)]
enum QuitMode {
    /// Drop everything still queued.
    Now,
    /// Run what was due at `at`, drop the rest.
    Safely { at: Instant },
}

/// What the loop should do next.
pub(crate) enum Next {
    Run(Message),
    Exit { discarded: u64 },
}

struct State {
    heap: BinaryHeap<Message>,
    next_seq: u64,
    quit: Option<QuitMode>,
}

pub(crate) struct MessageQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                next_seq: 0,
                quit: None,
            }),
            available: Condvar::new(),
        }
    }

    /// Queue `task` to run at `when`, or immediately when `None`.
    ///
    /// Past instants are clamped to now, so they queue behind earlier
    /// immediate posts. Hands the task back if the queue has been asked
    /// to quit.
    pub fn enqueue(&self, task: Task, when: Option<Instant>) -> Result<u64, Task> {
        let mut state = self.state.lock();
        if state.quit.is_some() {
            return Err(task);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let now = Instant::now();
        let when = when.map_or(now, |when| when.max(now));
        state.heap.push(Message { when, seq, task });
        drop(state);
        self.available.notify_one();
        Ok(seq)
    }

    /// Request the loop to stop. `safely` keeps messages already due.
    ///
    /// A later `quit(false)` escalates an earlier safe quit; the reverse
    /// has no effect.
    pub fn quit(&self, safely: bool) {
        let mut state = self.state.lock();
        state.quit = match (state.quit, safely) {
            (None, true) => Some(QuitMode::Safely { at: Instant::now() }),
            (Some(QuitMode::Safely { at }), true) => Some(QuitMode::Safely { at }),
            (_, false) => Some(QuitMode::Now),
            (Some(QuitMode::Now), true) => Some(QuitMode::Now),
        };
        drop(state);
        self.available.notify_all();
    }

    pub fn is_quitting(&self) -> bool {
        self.state.lock().quit.is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Block until a message is due or the queue is told to quit.
    pub fn next(&self) -> Next {
        let mut state = self.state.lock();
        loop {
            let quit = state.quit;
            let cutoff = match quit {
                Some(QuitMode::Now) => return exit(state),
                Some(QuitMode::Safely { at }) => at,
                None => Instant::now(),
            };

            let due = state.heap.peek().map(|m| m.when);
            match due {
                Some(when) if when <= cutoff => {
                    if let Some(message) = state.heap.pop() {
                        return Next::Run(message);
                    }
                }
                _ if quit.is_some() => return exit(state),
                Some(when) => {
                    self.available.wait_until(&mut state, when);
                }
                None => {
                    self.available.wait(&mut state);
                }
            }
        }
    }
}

/// Discarded tasks are dropped after the lock is released, since a task may
/// own a handle whose drop touches this queue.
fn exit(mut state: MutexGuard<'_, State>) -> Next {
    let dropped = std::mem::take(&mut state.heap);
    drop(state);
    Next::Exit {
        discarded: dropped.len() as u64,
    }
}
