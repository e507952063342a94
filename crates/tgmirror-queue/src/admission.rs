//! Per-class slot pools and the admission decision.
//!
//! # Design
//!
//! - A pool counts slot holders, not registry phases, so a task woken by the
//!   dispatcher owns its slot before it has re-registered as active.
//! - The capacity check and the slot reservation happen under one lock.
//! - The waiting queue is FIFO; each waiter carries its wake handle and its
//!   cancellation flag so the dispatcher can skip abandoned entries.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use tgmirror_core::{CancellationFlag, TaskDescriptor, TaskStatus};
use tgmirror_events::TaskClass;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::controller::QueueController;
use crate::error::{QueueError, QueueResult};
use crate::wait::WaitHandle;

/// Point-in-time view of one class pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Class this pool serves.
    pub class: TaskClass,
    /// Concurrency limit; `None` means unlimited.
    pub limit: Option<NonZeroUsize>,
    /// Tasks holding a slot.
    pub running: Vec<Uuid>,
    /// Tasks waiting for a slot, front of the queue first.
    pub queued: Vec<Uuid>,
}

/// Result of an admission request.
#[derive(Debug, Clone)]
pub enum Admission {
    /// A slot was reserved; the caller proceeds immediately.
    Granted,
    /// No slot is free; the caller waits on `handle`.
    Queued {
        /// Set by the dispatcher once a slot is reserved for the task.
        handle: WaitHandle,
        /// One-based position in the queue at the time of admission.
        position: usize,
    },
}

impl Admission {
    /// Whether the caller has to wait before starting.
    #[must_use]
    pub const fn must_queue(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// Wake handle for queued admissions.
    #[must_use]
    pub const fn wait_handle(&self) -> Option<&WaitHandle> {
        match self {
            Self::Granted => None,
            Self::Queued { handle, .. } => Some(handle),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Waiter {
    pub(crate) task_id: Uuid,
    pub(crate) handle: WaitHandle,
    pub(crate) cancellation: CancellationFlag,
}

#[derive(Debug, Default)]
pub(crate) struct PoolState {
    pub(crate) running: HashSet<Uuid>,
    pub(crate) waiting: VecDeque<Waiter>,
}

/// Removal performed by [`ClassPool::withdraw`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Withdrawal {
    pub(crate) held_slot: bool,
    pub(crate) was_waiting: bool,
}

#[derive(Debug)]
pub(crate) struct ClassPool {
    class: TaskClass,
    limit: Option<NonZeroUsize>,
    state: Mutex<PoolState>,
}

impl ClassPool {
    pub(crate) fn new(class: TaskClass, limit: Option<NonZeroUsize>) -> Self {
        Self {
            class,
            limit,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub(crate) const fn class(&self) -> TaskClass {
        self.class
    }

    pub(crate) const fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    pub(crate) fn lock(&self) -> QueueResult<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|_| QueueError::AdmissionFailure {
            class: self.class,
            reason: "pool lock poisoned",
        })
    }

    pub(crate) fn has_capacity(&self, state: &PoolState) -> bool {
        self.limit
            .is_none_or(|limit| state.running.len() < limit.get())
    }

    /// Reserve a slot or enqueue the task.
    pub(crate) fn admit(&self, task: &TaskDescriptor) -> QueueResult<Admission> {
        let mut state = self.lock()?;
        if state.running.contains(&task.id) {
            return Ok(Admission::Granted);
        }
        if state.waiting.iter().any(|waiter| waiter.task_id == task.id) {
            return Err(QueueError::AlreadyQueued {
                task_id: task.id,
                class: self.class,
            });
        }
        if self.has_capacity(&state) {
            state.running.insert(task.id);
            return Ok(Admission::Granted);
        }
        let handle = WaitHandle::new();
        state.waiting.push_back(Waiter {
            task_id: task.id,
            handle: handle.clone(),
            cancellation: task.cancellation.clone(),
        });
        Ok(Admission::Queued {
            handle,
            position: state.waiting.len(),
        })
    }

    /// Give back the slot held by `task_id`. Returns whether one was held.
    pub(crate) fn release(&self, task_id: Uuid) -> QueueResult<bool> {
        let mut state = self.lock()?;
        Ok(state.running.remove(&task_id))
    }

    /// Drop every trace of `task_id` from this pool.
    pub(crate) fn withdraw(&self, task_id: Uuid) -> QueueResult<Withdrawal> {
        let mut state = self.lock()?;
        let held_slot = state.running.remove(&task_id);
        let before = state.waiting.len();
        state.waiting.retain(|waiter| waiter.task_id != task_id);
        Ok(Withdrawal {
            held_slot,
            was_waiting: state.waiting.len() != before,
        })
    }

    pub(crate) fn counts(&self) -> QueueResult<(usize, usize)> {
        let state = self.lock()?;
        Ok((state.running.len(), state.waiting.len()))
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = self.state.lock();
                    panic!("poison pool for test");
                })
                .join();
        });
    }

    pub(crate) fn snapshot(&self) -> QueueResult<PoolSnapshot> {
        let state = self.lock()?;
        let mut running: Vec<Uuid> = state.running.iter().copied().collect();
        running.sort_unstable();
        Ok(PoolSnapshot {
            class: self.class,
            limit: self.limit,
            running,
            queued: state.waiting.iter().map(|waiter| waiter.task_id).collect(),
        })
    }
}

impl QueueController {
    /// Decide whether `task` may start in `class` now or must wait.
    ///
    /// Queued tasks are registered in the class's queued phase before this
    /// returns; granted tasks register themselves as active.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::AdmissionFailure` when the slot accounting or the
    /// registry cannot be read, and `QueueError::AlreadyQueued` when the task
    /// is already waiting in this class.
    pub fn request_admission(
        &self,
        task: &TaskDescriptor,
        class: TaskClass,
    ) -> QueueResult<Admission> {
        let pool = self.pool(class);
        let admission = pool.admit(task)?;

        match &admission {
            Admission::Granted => {
                debug!(task_id = %task.id, class = %class, "slot granted");
                self.record_admission(class, "granted");
            }
            Admission::Queued { position, .. } => {
                if let Err(err) = self.register_queued(task, class) {
                    self.roll_back_queued(task.id, class);
                    return Err(QueueError::AdmissionFailure {
                        class,
                        reason: registry_failure_reason(&err),
                    });
                }
                info!(
                    task_id = %task.id,
                    class = %class,
                    position = *position,
                    "task queued"
                );
                self.record_admission(class, "queued");
            }
        }
        self.refresh_gauges(class);
        Ok(admission)
    }

    /// Undo a queue entry whose registration failed. The dispatcher may have
    /// woken the task in between, in which case the freed slot is handed on.
    pub(crate) fn roll_back_queued(&self, task_id: Uuid, class: TaskClass) {
        match self.pool(class).withdraw(task_id) {
            Ok(withdrawal) if withdrawal.held_slot => {
                self.on_task_finished(class);
            }
            Ok(_) => self.refresh_gauges(class),
            Err(err) => {
                error!(task_id = %task_id, class = %class, error = %err, "queue rollback failed");
            }
        }
    }

    fn register_queued(&self, task: &TaskDescriptor, class: TaskClass) -> QueueResult<()> {
        let phase = class.queued_phase();
        if self.registry().contains(task.id)? {
            self.registry().update_phase(task.id, phase)?;
        } else {
            self.registry().insert(TaskStatus::new(task, phase))?;
        }
        Ok(())
    }
}

const fn registry_failure_reason(err: &QueueError) -> &'static str {
    match err {
        QueueError::RegistryPoisoned { .. } => "registry unavailable",
        QueueError::InvalidTransition { .. } => "registry entry in unexpected phase",
        _ => "registry update failed",
    }
}
