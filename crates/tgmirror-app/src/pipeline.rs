//! Per-task adapter flow shared by the torrent, cloud-storage and direct-link
//! engines.
//!
//! # Design
//!
//! - Metadata is resolved and the duplicate guard consulted before any slot is requested.
//! - Cancellation is observed while queued and once more right before the transfer starts.
//! - The download slot is handed on before the task contends for an upload slot.
//! - Tasks that fail or are cancelled while registered record the terminal phase first.
//! - Engine cleanup, controller withdrawal and the duplicate reservation release run on every exit path.

use std::sync::Arc;

use tgmirror_config::TaskPolicy;
use tgmirror_core::{TaskDescriptor, TransferBackend};
use tgmirror_events::{Event, EventBus, TaskClass, TaskPhase};
use tgmirror_queue::{Admission, DuplicateGuard, QueueController, QueueError, WakeOutcome, wait_for_slot};
use tgmirror_telemetry::{Metrics, task_span};
use tracing::{Instrument, debug, info, warn};

use crate::backends::Backends;
use crate::error::{AppError, AppResult};

/// How a task left the pipeline when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Download and, when configured, upload finished.
    Completed,
    /// Rejected before admission; `message` is meant for the requester.
    Duplicate {
        /// Explanation for the requester.
        message: String,
    },
    /// The requester cancelled before or during the transfer.
    Cancelled,
}

/// Drives tasks through admission, transfer and cleanup.
#[derive(Clone)]
pub struct TaskPipeline {
    controller: Arc<QueueController>,
    guard: DuplicateGuard,
    backends: Backends,
    events: EventBus,
    policy: TaskPolicy,
    metrics: Option<Metrics>,
}

impl TaskPipeline {
    /// Pipeline over a shared controller.
    #[must_use]
    pub fn new(
        controller: Arc<QueueController>,
        guard: DuplicateGuard,
        backends: Backends,
        events: EventBus,
        policy: TaskPolicy,
    ) -> Self {
        Self {
            controller,
            guard,
            backends,
            events,
            policy,
            metrics: None,
        }
    }

    /// Count duplicate rejections in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Controller shared by every task of this pipeline.
    #[must_use]
    pub fn controller(&self) -> &QueueController {
        &self.controller
    }

    /// Run `task` to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error when no engine serves the task's source, when an
    /// engine fails, or when the controller cannot admit or track the task.
    /// A `TaskFailed` event is published before the error is returned.
    pub async fn run(&self, task: TaskDescriptor) -> AppResult<PipelineOutcome> {
        let span = task_span(task.id, task.source.kind.as_str());
        self.run_task(task).instrument(span).await
    }

    async fn run_task(&self, mut task: TaskDescriptor) -> AppResult<PipelineOutcome> {
        let backend = match self.backends.transfer_for(task.source.kind) {
            Ok(backend) => backend,
            Err(err) => return Err(self.report_failure(&task, err)),
        };

        let result = self.drive(&mut task, backend.as_ref()).await;
        match &result {
            Ok(PipelineOutcome::Cancelled) => self.mark_terminal(&task, TaskPhase::Cancelled),
            Err(_) => self.mark_terminal(&task, TaskPhase::Errored),
            Ok(_) => {}
        }
        self.cleanup(&task, backend.as_ref()).await;

        match result {
            Ok(PipelineOutcome::Completed) => {
                info!(name = task.display_name(), "task completed");
                self.events.publish(Event::TaskCompleted { task_id: task.id });
                Ok(PipelineOutcome::Completed)
            }
            Ok(PipelineOutcome::Cancelled) => {
                info!("task cancelled");
                self.events.publish(Event::TaskCancelled { task_id: task.id });
                Ok(PipelineOutcome::Cancelled)
            }
            Ok(duplicate @ PipelineOutcome::Duplicate { .. }) => Ok(duplicate),
            Err(err) => Err(self.report_failure(&task, err)),
        }
    }

    async fn drive(
        &self,
        task: &mut TaskDescriptor,
        backend: &dyn TransferBackend,
    ) -> AppResult<PipelineOutcome> {
        let metadata = backend
            .resolve_metadata(&task.source)
            .await
            .map_err(|err| AppError::backend("backend.resolve_metadata", task.id, err))?;
        task.apply_metadata(metadata);

        match self.guard.check(task) {
            Ok(()) => {}
            Err(QueueError::DuplicateTask { message, .. }) => {
                info!(name = task.display_name(), "duplicate task rejected");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_duplicate_rejected();
                }
                self.events.publish(Event::DuplicateRejected {
                    task_id: task.id,
                    message: message.clone(),
                });
                return Ok(PipelineOutcome::Duplicate { message });
            }
            Err(err) => return Err(AppError::queue("duplicate.check", err)),
        }

        if !self.acquire(task, TaskClass::Download).await? {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.start(task, TaskClass::Download, backend.session_ref(task))?;

        if self.selects_files(task) {
            self.set_phase(task, TaskPhase::SelectingFiles)?;
            self.events.publish(Event::SelectionRequested { task_id: task.id });
            tokio::select! {
                biased;
                () = task.cancellation.cancelled() => return Ok(PipelineOutcome::Cancelled),
                selected = backend.await_selection(task) => {
                    selected.map_err(|err| AppError::backend("backend.await_selection", task.id, err))?;
                }
            }
            self.set_phase(task, TaskPhase::ActiveDownload)?;
        }

        backend
            .download(task)
            .await
            .map_err(|err| AppError::backend("backend.download", task.id, err))?;

        let Some(upload) = self.backends.upload().cloned() else {
            self.set_phase(task, TaskPhase::Completed)?;
            self.release(task, TaskClass::Download)?;
            self.record_completed(task);
            return Ok(PipelineOutcome::Completed);
        };

        self.set_phase(task, TaskPhase::QueuedUpload)?;
        self.release(task, TaskClass::Download)?;
        if !self.acquire(task, TaskClass::Upload).await? {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.start(task, TaskClass::Upload, None)?;
        upload
            .upload(task)
            .await
            .map_err(|err| AppError::backend("upload.upload", task.id, err))?;

        self.set_phase(task, TaskPhase::Completed)?;
        self.release(task, TaskClass::Upload)?;
        self.record_completed(task);
        Ok(PipelineOutcome::Completed)
    }

    /// Request a `class` slot and wait for it if needed. Returns `false` when
    /// the task was cancelled before it could start.
    async fn acquire(&self, task: &TaskDescriptor, class: TaskClass) -> AppResult<bool> {
        let admission = self
            .controller
            .request_admission(task, class)
            .map_err(|err| AppError::queue("controller.request_admission", err))?;

        let Admission::Queued { handle, position } = &admission else {
            if task.is_cancelled() {
                debug!(class = %class, "cancelled before start");
                return Ok(false);
            }
            // Selection prompts replace the status message for paused torrents.
            if class == TaskClass::Download && !self.selects_files(task) {
                self.announce_status(task);
            }
            return Ok(true);
        };

        self.events.publish(Event::TaskQueued {
            task_id: task.id,
            class,
            position: *position,
        });
        self.announce_status(task);
        if wait_for_slot(handle, &task.cancellation).await == WakeOutcome::Cancelled {
            debug!(class = %class, "cancelled while queued");
            return Ok(false);
        }
        if task.is_cancelled() {
            debug!(class = %class, "cancelled before start");
            return Ok(false);
        }
        Ok(true)
    }

    const fn selects_files(&self, task: &TaskDescriptor) -> bool {
        self.policy.select_files && task.select_files
    }

    fn announce_status(&self, task: &TaskDescriptor) {
        if !task.suppresses_status() {
            self.events.publish(Event::StatusAnnounced { task_id: task.id });
        }
    }

    fn start(
        &self,
        task: &TaskDescriptor,
        class: TaskClass,
        backend_ref: Option<String>,
    ) -> AppResult<()> {
        let status = self
            .controller
            .activate(task, class, backend_ref)
            .map_err(|err| AppError::queue("controller.activate", err))?;
        info!(class = %class, name = %status.name, "transfer started");
        self.events.publish(Event::TaskStarted {
            task_id: task.id,
            class,
        });
        self.events.publish(Event::PhaseChanged {
            task_id: task.id,
            phase: status.phase,
        });
        Ok(())
    }

    fn set_phase(&self, task: &TaskDescriptor, phase: TaskPhase) -> AppResult<()> {
        self.controller
            .update_phase(task.id, phase)
            .map_err(|err| AppError::queue("controller.update_phase", err))?;
        self.events.publish(Event::PhaseChanged {
            task_id: task.id,
            phase,
        });
        Ok(())
    }

    /// Record `phase` on a still registered task. Tasks that never registered,
    /// or already completed, keep their entry as is.
    fn mark_terminal(&self, task: &TaskDescriptor, phase: TaskPhase) {
        match self.controller.update_phase(task.id, phase) {
            Ok(_) => {
                self.events.publish(Event::PhaseChanged {
                    task_id: task.id,
                    phase,
                });
            }
            Err(err) => debug!(phase = %phase, error = %err, "terminal phase not recorded"),
        }
    }

    fn release(&self, task: &TaskDescriptor, class: TaskClass) -> AppResult<()> {
        self.controller
            .finish(task.id, class)
            .map_err(|err| AppError::queue("controller.finish", err))?;
        Ok(())
    }

    fn record_completed(&self, task: &TaskDescriptor) {
        if let Err(err) = self.guard.record_completed(task) {
            warn!(error = %err, "failed to record completed source");
        }
    }

    async fn cleanup(&self, task: &TaskDescriptor, backend: &dyn TransferBackend) {
        if let Err(err) = backend.cleanup(task).await {
            warn!(error = %err, "engine cleanup failed");
        }
        if let Err(err) = self.controller.withdraw(task.id) {
            warn!(error = %err, "failed to withdraw task from controller");
        }
        if let Err(err) = self.guard.release(task) {
            warn!(error = %err, "failed to release duplicate reservation");
        }
    }

    fn report_failure(&self, task: &TaskDescriptor, err: AppError) -> AppError {
        let message = err.report();
        warn!(error = %message, "task failed");
        self.events.publish(Event::TaskFailed {
            task_id: task.id,
            message,
        });
        err
    }
}
