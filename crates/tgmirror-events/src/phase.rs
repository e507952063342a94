//! Concurrency classes and the per-task phase state machine.

use std::fmt::{self, Display, Formatter};

/// Independent concurrency pool a task competes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    /// Fetching the payload from its source.
    Download,
    /// Pushing the finished payload to its destination.
    Upload,
}

impl TaskClass {
    /// Every class, in a stable order.
    pub const ALL: [Self; 2] = [Self::Download, Self::Upload];

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
        }
    }

    /// Phase a task of this class holds while waiting for a slot.
    #[must_use]
    pub const fn queued_phase(self) -> TaskPhase {
        match self {
            Self::Download => TaskPhase::QueuedDownload,
            Self::Upload => TaskPhase::QueuedUpload,
        }
    }

    /// Phase a task of this class holds while it owns a slot.
    #[must_use]
    pub const fn active_phase(self) -> TaskPhase {
        match self {
            Self::Download => TaskPhase::ActiveDownload,
            Self::Upload => TaskPhase::ActiveUpload,
        }
    }
}

impl Display for TaskClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Waiting for a download slot.
    QueuedDownload,
    /// Waiting for an upload slot.
    QueuedUpload,
    /// Holding a download slot and transferring.
    ActiveDownload,
    /// Holding an upload slot and transferring.
    ActiveUpload,
    /// Download paused while the requester picks files.
    SelectingFiles,
    /// Finished successfully.
    Completed,
    /// Failed with an unrecoverable error.
    Errored,
    /// Cancelled by the requester.
    Cancelled,
}

impl TaskPhase {
    /// Label used in logs and status messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueuedDownload => "queued-download",
            Self::QueuedUpload => "queued-upload",
            Self::ActiveDownload => "active-download",
            Self::ActiveUpload => "active-upload",
            Self::SelectingFiles => "selecting-files",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }

    /// Class whose slot this phase waits for or occupies.
    ///
    /// `SelectingFiles` still occupies the download slot it was entered from.
    #[must_use]
    pub const fn class(self) -> Option<TaskClass> {
        match self {
            Self::QueuedDownload | Self::ActiveDownload | Self::SelectingFiles => {
                Some(TaskClass::Download)
            }
            Self::QueuedUpload | Self::ActiveUpload => Some(TaskClass::Upload),
            Self::Completed | Self::Errored | Self::Cancelled => None,
        }
    }

    /// Whether the phase is waiting on a wait handle.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::QueuedDownload | Self::QueuedUpload)
    }

    /// Whether the phase counts as active work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::ActiveDownload | Self::ActiveUpload | Self::SelectingFiles
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }

    /// Whether `next` is reachable from `self` in a single step.
    ///
    /// Error and cancellation are reachable from every non-terminal phase.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Errored | Self::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::QueuedDownload, Self::ActiveDownload)
                | (
                    Self::ActiveDownload,
                    Self::SelectingFiles
                        | Self::QueuedUpload
                        | Self::ActiveUpload
                        | Self::Completed
                )
                | (Self::SelectingFiles, Self::ActiveDownload)
                | (Self::QueuedUpload, Self::ActiveUpload)
                | (Self::ActiveUpload, Self::Completed)
        )
    }
}

impl Display for TaskPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_phases_only_advance_to_their_active_phase() {
        assert!(TaskPhase::QueuedDownload.can_transition_to(TaskPhase::ActiveDownload));
        assert!(!TaskPhase::QueuedDownload.can_transition_to(TaskPhase::ActiveUpload));
        assert!(!TaskPhase::QueuedDownload.can_transition_to(TaskPhase::Completed));
        assert!(TaskPhase::QueuedUpload.can_transition_to(TaskPhase::ActiveUpload));
        assert!(!TaskPhase::QueuedUpload.can_transition_to(TaskPhase::ActiveDownload));
    }

    #[test]
    fn selecting_files_is_entered_and_left_through_active_download() {
        assert!(TaskPhase::ActiveDownload.can_transition_to(TaskPhase::SelectingFiles));
        assert!(TaskPhase::SelectingFiles.can_transition_to(TaskPhase::ActiveDownload));
        assert!(TaskPhase::SelectingFiles.can_transition_to(TaskPhase::Cancelled));
        assert!(!TaskPhase::SelectingFiles.can_transition_to(TaskPhase::ActiveUpload));
        assert!(!TaskPhase::ActiveUpload.can_transition_to(TaskPhase::SelectingFiles));
    }

    #[test]
    fn terminal_phases_are_final() {
        for terminal in [TaskPhase::Completed, TaskPhase::Errored, TaskPhase::Cancelled] {
            assert!(terminal.is_terminal());
            assert!(terminal.class().is_none());
            assert!(!terminal.can_transition_to(TaskPhase::ActiveDownload));
            assert!(!terminal.can_transition_to(TaskPhase::Cancelled));
        }
    }

    #[test]
    fn cancellation_and_error_reachable_from_every_live_phase() {
        let live = [
            TaskPhase::QueuedDownload,
            TaskPhase::QueuedUpload,
            TaskPhase::ActiveDownload,
            TaskPhase::ActiveUpload,
            TaskPhase::SelectingFiles,
        ];
        for phase in live {
            assert!(phase.can_transition_to(TaskPhase::Cancelled), "{phase}");
            assert!(phase.can_transition_to(TaskPhase::Errored), "{phase}");
        }
    }

    #[test]
    fn class_phase_helpers_round_trip() {
        for class in TaskClass::ALL {
            assert_eq!(class.queued_phase().class(), Some(class));
            assert_eq!(class.active_phase().class(), Some(class));
            assert!(class.queued_phase().is_queued());
            assert!(class.active_phase().is_active());
        }
        assert_eq!(TaskPhase::SelectingFiles.class(), Some(TaskClass::Download));
        assert_eq!(TaskPhase::QueuedUpload.to_string(), "queued-upload");
    }
}
