//! Facade tying the slot pools, the registry and metrics together.

use std::num::NonZeroUsize;

use tgmirror_config::QueuePolicy;
use tgmirror_core::{TaskDescriptor, TaskStatus};
use tgmirror_events::{TaskClass, TaskPhase};
use tgmirror_telemetry::Metrics;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::admission::{ClassPool, PoolSnapshot};
use crate::error::QueueResult;
use crate::registry::TaskRegistry;

/// Admission and wake controller for the download and upload classes.
///
/// Shared by every task pipeline, typically behind an `Arc`.
pub struct QueueController {
    registry: TaskRegistry,
    download: ClassPool,
    upload: ClassPool,
    metrics: Option<Metrics>,
}

impl QueueController {
    /// Controller with a fresh registry.
    #[must_use]
    pub fn new(policy: &QueuePolicy) -> Self {
        Self::with_registry(policy, TaskRegistry::new())
    }

    /// Controller sharing an existing registry.
    #[must_use]
    pub fn with_registry(policy: &QueuePolicy, registry: TaskRegistry) -> Self {
        Self {
            registry,
            download: ClassPool::new(
                TaskClass::Download,
                policy.limit_for(TaskClass::Download),
            ),
            upload: ClassPool::new(TaskClass::Upload, policy.limit_for(TaskClass::Upload)),
            metrics: None,
        }
    }

    /// Publish pool gauges and admission counters to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        for class in TaskClass::ALL {
            self.refresh_gauges(class);
        }
        self
    }

    /// Shared status registry.
    #[must_use]
    pub const fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Configured limit for `class`; `None` means unlimited.
    #[must_use]
    pub const fn limit(&self, class: TaskClass) -> Option<NonZeroUsize> {
        self.pool(class).limit()
    }

    pub(crate) const fn pool(&self, class: TaskClass) -> &ClassPool {
        match class {
            TaskClass::Download => &self.download,
            TaskClass::Upload => &self.upload,
        }
    }

    pub(crate) const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Insert or replace a status entry.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the registry is unusable.
    pub fn register(&self, status: TaskStatus) -> QueueResult<()> {
        debug!(task_id = %status.task_id, phase = %status.phase, "task registered");
        self.registry.insert(status)?;
        Ok(())
    }

    /// Record that `task` now runs in `class`, creating the entry if needed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidTransition` when the existing entry cannot
    /// move to the active phase, or `QueueError::RegistryPoisoned`.
    pub fn activate(
        &self,
        task: &TaskDescriptor,
        class: TaskClass,
        backend_ref: Option<String>,
    ) -> QueueResult<TaskStatus> {
        let phase = class.active_phase();
        if !self.registry.contains(task.id)? {
            let mut status = TaskStatus::new(task, phase);
            status.backend_ref = backend_ref;
            self.register(status.clone())?;
            return Ok(status);
        }
        self.registry.update_phase(task.id, phase)?;
        self.registry.update(task.id, |status| {
            status.name = task.display_name().to_string();
            status.size_bytes = task.size_bytes;
            if backend_ref.is_some() {
                status.backend_ref = backend_ref;
            }
            status.clone()
        })
    }

    /// Move a registered task to `phase`.
    ///
    /// # Errors
    ///
    /// See [`TaskRegistry::update_phase`].
    pub fn update_phase(&self, task_id: Uuid, phase: TaskPhase) -> QueueResult<TaskStatus> {
        let status = self.registry.update_phase(task_id, phase)?;
        debug!(task_id = %task_id, phase = %phase, "phase updated");
        Ok(status)
    }

    /// Drop the status entry for `task_id`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the registry is unusable.
    pub fn unregister(&self, task_id: Uuid) -> QueueResult<Option<TaskStatus>> {
        let removed = self.registry.remove(task_id)?;
        if removed.is_some() {
            debug!(task_id = %task_id, "task unregistered");
        }
        Ok(removed)
    }

    /// Give back the `class` slot held by `task_id` without dispatching.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::AdmissionFailure` when the pool is unusable.
    pub fn release(&self, task_id: Uuid, class: TaskClass) -> QueueResult<bool> {
        let released = self.pool(class).release(task_id)?;
        if !released {
            warn!(task_id = %task_id, class = %class, "release without a held slot");
        }
        self.refresh_gauges(class);
        Ok(released)
    }

    /// Release the `class` slot held by `task_id` and wake queued tasks.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::AdmissionFailure` when the pool is unusable.
    pub fn finish(&self, task_id: Uuid, class: TaskClass) -> QueueResult<Vec<Uuid>> {
        self.release(task_id, class)?;
        Ok(self.on_task_finished(class))
    }

    /// Remove every trace of `task_id`: queue entries, held slots and its
    /// status. Freed slots are handed to the next waiters.
    ///
    /// # Errors
    ///
    /// Returns the first pool or registry failure encountered.
    pub fn withdraw(&self, task_id: Uuid) -> QueueResult<Option<TaskStatus>> {
        for class in TaskClass::ALL {
            let withdrawal = self.pool(class).withdraw(task_id)?;
            if withdrawal.was_waiting {
                debug!(task_id = %task_id, class = %class, "left queue");
            }
            if withdrawal.held_slot {
                self.on_task_finished(class);
            } else {
                self.refresh_gauges(class);
            }
        }
        self.unregister(task_id)
    }

    /// Point-in-time view of the `class` pool.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::AdmissionFailure` when the pool is unusable.
    pub fn snapshot(&self, class: TaskClass) -> QueueResult<PoolSnapshot> {
        self.pool(class).snapshot()
    }

    pub(crate) fn record_admission(&self, class: TaskClass, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_admission(class, outcome);
        }
    }

    pub(crate) fn refresh_gauges(&self, class: TaskClass) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if let Ok((running, waiting)) = self.pool(class).counts() {
            metrics.set_active(class, running);
            metrics.set_queued(class, waiting);
        }
    }
}
