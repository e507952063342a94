//! # Design
//!
//! - Centralize application-level errors for bootstrap and the task pipeline.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;
use tgmirror_core::SourceKind;
use uuid::Uuid;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tgmirror_config::ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tgmirror_telemetry::TelemetryError,
    },
    /// Controller operations failed.
    #[error("queue operation failed")]
    Queue {
        /// Operation identifier.
        operation: &'static str,
        /// Source controller error.
        source: tgmirror_queue::QueueError,
    },
    /// No transfer engine is wired for the task's source.
    #[error("no backend registered for source kind")]
    MissingBackend {
        /// Source kind without a backend.
        kind: SourceKind,
    },
    /// A transfer or upload engine reported a failure.
    #[error("backend operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Task the engine was working on.
        task_id: Uuid,
        /// Source engine error.
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tgmirror_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tgmirror_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn queue(operation: &'static str, source: tgmirror_queue::QueueError) -> Self {
        Self::Queue { operation, source }
    }

    pub(crate) const fn backend(
        operation: &'static str,
        task_id: Uuid,
        source: anyhow::Error,
    ) -> Self {
        Self::Backend {
            operation,
            task_id,
            source,
        }
    }

    /// Message for the requester: this error followed by its source chain.
    #[must_use]
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_source_chain() {
        let err = AppError::backend(
            "backend.download",
            Uuid::nil(),
            anyhow::anyhow!("tracker unreachable"),
        );
        assert_eq!(err.to_string(), "backend operation failed");
        assert_eq!(err.report(), "backend operation failed: tracker unreachable");
    }

    #[test]
    fn missing_backend_has_no_source() {
        let err = AppError::MissingBackend {
            kind: SourceKind::GoogleDrive,
        };
        assert_eq!(err.report(), "no backend registered for source kind");
    }
}
