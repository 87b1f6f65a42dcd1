//! # looper-rs
//!
//! Named background worker threads with their own message loops, and
//! API-level gates over an injected platform version.
//!
//! Provides the version gate ([`build_check`]), the worker factory
//! ([`looper`]), typed configuration, and OpenTelemetry observability.

pub mod build_check;
pub mod config;
pub mod error;
pub mod looper;
pub mod telemetry;

pub use build_check::{ApiLevel, ApiLevelSource, BuildCheck};
pub use error::{Error, Result};
pub use looper::{Handler, HandlerThread, WorkerGroup, WorkerStats};
