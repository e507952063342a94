//! Routing from source kind to transfer engine.

use std::collections::HashMap;
use std::sync::Arc;

use tgmirror_core::{SourceKind, TransferBackend, UploadBackend};

use crate::error::{AppError, AppResult};

/// Transfer engines keyed by the source kind they serve, plus the optional
/// upload destination.
#[derive(Clone, Default)]
pub struct Backends {
    transfers: HashMap<SourceKind, Arc<dyn TransferBackend>>,
    upload: Option<Arc<dyn UploadBackend>>,
}

impl Backends {
    /// No engines wired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `backend.kind()` sources to `backend`, replacing any previous one.
    #[must_use]
    pub fn with_transfer(mut self, backend: Arc<dyn TransferBackend>) -> Self {
        self.transfers.insert(backend.kind(), backend);
        self
    }

    /// Upload finished downloads through `upload`.
    #[must_use]
    pub fn with_upload(mut self, upload: Arc<dyn UploadBackend>) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Engine serving `kind`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MissingBackend` when nothing is wired for `kind`.
    pub fn transfer_for(&self, kind: SourceKind) -> AppResult<Arc<dyn TransferBackend>> {
        self.transfers
            .get(&kind)
            .cloned()
            .ok_or(AppError::MissingBackend { kind })
    }

    /// Upload destination, if configured.
    #[must_use]
    pub fn upload(&self) -> Option<&Arc<dyn UploadBackend>> {
        self.upload.as_ref()
    }
}
