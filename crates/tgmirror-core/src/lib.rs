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

//! Engine-agnostic task DTOs and backend interfaces.
//!
//! Layout: `model/` (task descriptors and statuses), `service/` (backend
//! traits implemented by the torrent, cloud-storage and direct-link engines),
//! `error.rs` (`TaskError`).

pub mod error;
pub mod model;
pub mod service;

pub use error::{TaskError, TaskResult};
pub use model::{
    CancellationFlag, SourceKind, SourceMetadata, TaskDescriptor, TaskSource, TaskStatus,
};
pub use service::{TransferBackend, UploadBackend};
pub use tgmirror_events::{TaskClass, TaskPhase};
