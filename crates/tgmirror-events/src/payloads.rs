//! Event payload types carried between the controller and the chat layer.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::phase::{TaskClass, TaskPhase};

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed task lifecycle events surfaced to the requester-facing layer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task could not start immediately and is waiting for a slot.
    TaskQueued {
        /// Identifier of the queued task.
        task_id: Uuid,
        /// Concurrency class the task is waiting on.
        class: TaskClass,
        /// One-based position in the class queue at the time of queueing.
        position: usize,
    },
    /// Task acquired a slot and began active work in the given class.
    TaskStarted {
        /// Identifier of the started task.
        task_id: Uuid,
        /// Concurrency class the slot belongs to.
        class: TaskClass,
    },
    /// Task moved to a new phase.
    PhaseChanged {
        /// Identifier of the task whose phase changed.
        task_id: Uuid,
        /// Phase after the transition.
        phase: TaskPhase,
    },
    /// Status message should be (re)sent for the task.
    StatusAnnounced {
        /// Identifier of the task to announce.
        task_id: Uuid,
    },
    /// Download paused until the requester picks files.
    SelectionRequested {
        /// Identifier of the task awaiting selection.
        task_id: Uuid,
    },
    /// Task was rejected before admission because its source is already handled.
    DuplicateRejected {
        /// Identifier of the rejected task.
        task_id: Uuid,
        /// Human-readable explanation for the requester.
        message: String,
    },
    /// Task finished all of its work.
    TaskCompleted {
        /// Identifier of the completed task.
        task_id: Uuid,
    },
    /// Task failed with an unrecoverable error.
    TaskFailed {
        /// Identifier of the failed task.
        task_id: Uuid,
        /// Human-readable failure detail.
        message: String,
    },
    /// Task was cancelled by its requester.
    TaskCancelled {
        /// Identifier of the cancelled task.
        task_id: Uuid,
    },
}

impl Event {
    /// Machine-friendly discriminator for subscribers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskQueued { .. } => "task_queued",
            Self::TaskStarted { .. } => "task_started",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::StatusAnnounced { .. } => "status_announced",
            Self::SelectionRequested { .. } => "selection_requested",
            Self::DuplicateRejected { .. } => "duplicate_rejected",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskCancelled { .. } => "task_cancelled",
        }
    }

    /// Task identifier carried by the event.
    #[must_use]
    pub const fn task_id(&self) -> Uuid {
        match self {
            Self::TaskQueued { task_id, .. }
            | Self::TaskStarted { task_id, .. }
            | Self::PhaseChanged { task_id, .. }
            | Self::StatusAnnounced { task_id }
            | Self::SelectionRequested { task_id }
            | Self::DuplicateRejected { task_id, .. }
            | Self::TaskCompleted { task_id }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskCancelled { task_id } => *task_id,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}
