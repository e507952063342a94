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

//! Mirror bot application wiring.
//!
//! Layout: `bootstrap.rs` (configuration, telemetry and controller wiring),
//! `backends.rs` (routing by source kind), `pipeline.rs` (the per-task
//! adapter flow shared by every transfer engine).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Transfer backend routing.
pub mod backends;
/// Application error types.
pub mod error;
/// Per-task adapter pipeline.
pub mod pipeline;

pub use backends::Backends;
pub use bootstrap::AppContext;
pub use error::{AppError, AppResult};
pub use pipeline::{PipelineOutcome, TaskPipeline};
