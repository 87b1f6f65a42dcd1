//! Error types for looper-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid worker name")]
    InvalidName,

    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker {0} has quit")]
    Quit(String),

    #[error("task panicked on worker {0}")]
    TaskPanicked(String),

    #[error("worker thread {0} terminated abnormally")]
    WorkerPanicked(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
