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

//! Download admission and queueing controller.
//!
//! Decides whether a task may start now or must wait, keeps the shared
//! registry of in-flight task statuses, and wakes queued tasks in arrival
//! order when a slot frees up. Download and upload are two independent
//! instances of the same pool logic.
//!
//! Layout: `registry.rs` (`TaskRegistry`), `wait.rs` (`WaitHandle`),
//! `admission.rs` (slot pools and `request_admission`), `dispatcher.rs`
//! (`on_task_finished`), `controller.rs` (`QueueController` facade),
//! `duplicate.rs` (`DuplicateGuard`), `error.rs` (`QueueError`).

mod admission;
mod controller;
mod dispatcher;
pub mod duplicate;
pub mod error;
pub mod registry;
pub mod wait;

pub use admission::{Admission, PoolSnapshot};
pub use controller::QueueController;
pub use duplicate::DuplicateGuard;
pub use error::{QueueError, QueueResult};
pub use registry::TaskRegistry;
pub use wait::{WaitHandle, WakeOutcome, wait_for_slot};
