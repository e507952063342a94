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

//! Read-only bot configuration: queue limits, task policy, and logging.
//!
//! Layout: `model.rs` (typed config models), `loader.rs` (environment and JSON
//! sources), `validate.rs` (field parsing helpers), `defaults.rs` (fallback values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{BotConfig, LogFormatSetting, LogSettings, QueuePolicy, TaskPolicy};
