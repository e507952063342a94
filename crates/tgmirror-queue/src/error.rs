//! # Design
//!
//! - Registry and admission failures propagate to the calling adapter.
//! - Dispatch failures are logged where they happen and never cross the dispatcher.
//! - Messages stay constant; context travels in fields.

use thiserror::Error;
use tgmirror_events::{TaskClass, TaskPhase};
use uuid::Uuid;

/// Result alias for controller operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Controller error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Slot accounting for a class could not be read; the task must fail.
    #[error("admission check failed")]
    AdmissionFailure {
        /// Class whose pool was unreadable.
        class: TaskClass,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The registry lock was poisoned by a panicking holder.
    #[error("task registry unavailable")]
    RegistryPoisoned {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Task duplicates one already in flight or completed for the same requester.
    #[error("duplicate task")]
    DuplicateTask {
        /// Rejected task.
        task_id: Uuid,
        /// Explanation for the requester.
        message: String,
    },
    /// Requested phase is not reachable from the current one.
    #[error("invalid phase transition")]
    InvalidTransition {
        /// Task being updated.
        task_id: Uuid,
        /// Current phase.
        from: TaskPhase,
        /// Requested phase.
        to: TaskPhase,
    },
    /// No registry entry exists for the task.
    #[error("task not registered")]
    UnknownTask {
        /// Missing task.
        task_id: Uuid,
    },
    /// Task is already waiting in this class's queue.
    #[error("task already queued")]
    AlreadyQueued {
        /// Task that requested admission twice.
        task_id: Uuid,
        /// Class it is queued in.
        class: TaskClass,
    },
}

impl QueueError {
    /// Informational outcomes that should not be reported as faults.
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        matches!(self, Self::DuplicateTask { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_informational_and_failures_are_not() {
        let duplicate = QueueError::DuplicateTask {
            task_id: Uuid::nil(),
            message: "already mirrored".into(),
        };
        assert!(duplicate.is_informational());
        assert_eq!(duplicate.to_string(), "duplicate task");

        let failure = QueueError::AdmissionFailure {
            class: TaskClass::Download,
            reason: "pool lock poisoned",
        };
        assert!(!failure.is_informational());
    }
}
