//! Error types for task descriptors.

use thiserror::Error;

/// Primary error type for task construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The source link could not be classified.
    #[error("invalid task source")]
    InvalidSource {
        /// Offending link.
        link: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

/// Convenience alias for task results.
pub type TaskResult<T> = Result<T, TaskError>;
