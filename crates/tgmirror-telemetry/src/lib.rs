#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the workspace.
//!
//! This crate centralises logging and queue metrics so the controller and the
//! adapter pipeline report through one consistent observability story.
//!
//! Layout: `init.rs` (subscriber setup), `context.rs` (span guards),
//! `metrics.rs` (Prometheus collectors), `error.rs` (`TelemetryError`).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, record_app_mode, task_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
