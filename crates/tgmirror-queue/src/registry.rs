//! Shared registry of in-flight task statuses.
//!
//! # Design
//!
//! - One mutex guards the whole map; every insert, update and removal is atomic.
//! - A poisoned lock surfaces as `RegistryPoisoned` instead of panicking the caller.
//! - Phase updates are checked against the lifecycle transition table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tgmirror_core::TaskStatus;
use tgmirror_events::TaskPhase;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};

/// Concurrent map from task identifier to its status entry.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    entries: Arc<Mutex<HashMap<Uuid, TaskStatus>>>,
}

impl TaskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, operation: &'static str) -> QueueResult<MutexGuard<'_, HashMap<Uuid, TaskStatus>>> {
        self.entries
            .lock()
            .map_err(|_| QueueError::RegistryPoisoned { operation })
    }

    /// Insert or replace an entry, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn insert(&self, status: TaskStatus) -> QueueResult<Option<TaskStatus>> {
        let mut entries = self.lock("registry.insert")?;
        Ok(entries.insert(status.task_id, status))
    }

    /// Clone of the entry for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn get(&self, task_id: Uuid) -> QueueResult<Option<TaskStatus>> {
        let entries = self.lock("registry.get")?;
        Ok(entries.get(&task_id).cloned())
    }

    /// Whether `task_id` has an entry.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn contains(&self, task_id: Uuid) -> QueueResult<bool> {
        let entries = self.lock("registry.contains")?;
        Ok(entries.contains_key(&task_id))
    }

    /// Apply `mutator` to the entry for `task_id` under the lock.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::UnknownTask` when no entry exists and
    /// `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn update<F, R>(&self, task_id: Uuid, mutator: F) -> QueueResult<R>
    where
        F: FnOnce(&mut TaskStatus) -> R,
    {
        let mut entries = self.lock("registry.update")?;
        let status = entries
            .get_mut(&task_id)
            .ok_or(QueueError::UnknownTask { task_id })?;
        let result = mutator(status);
        status.updated_at = Utc::now();
        Ok(result)
    }

    /// Move `task_id` to `phase`. Re-entering the current phase is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidTransition` when the lifecycle forbids the
    /// move, `QueueError::UnknownTask` when no entry exists and
    /// `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn update_phase(&self, task_id: Uuid, phase: TaskPhase) -> QueueResult<TaskStatus> {
        let mut entries = self.lock("registry.update_phase")?;
        let status = entries
            .get_mut(&task_id)
            .ok_or(QueueError::UnknownTask { task_id })?;
        if status.phase == phase {
            return Ok(status.clone());
        }
        if !status.phase.can_transition_to(phase) {
            return Err(QueueError::InvalidTransition {
                task_id,
                from: status.phase,
                to: phase,
            });
        }
        status.phase = phase;
        status.updated_at = Utc::now();
        Ok(status.clone())
    }

    /// Remove the entry for `task_id`. Removing a missing entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn remove(&self, task_id: Uuid) -> QueueResult<Option<TaskStatus>> {
        let mut entries = self.lock("registry.remove")?;
        Ok(entries.remove(&task_id))
    }

    /// First entry matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn find<P>(&self, predicate: P) -> QueueResult<Option<TaskStatus>>
    where
        P: Fn(&TaskStatus) -> bool,
    {
        let entries = self.lock("registry.find")?;
        Ok(entries.values().find(|status| predicate(status)).cloned())
    }

    /// Number of entries currently in `phase`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn count_in_phase(&self, phase: TaskPhase) -> QueueResult<usize> {
        let entries = self.lock("registry.count_in_phase")?;
        Ok(entries.values().filter(|status| status.phase == phase).count())
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn len(&self) -> QueueResult<usize> {
        Ok(self.lock("registry.len")?.len())
    }

    /// Whether the registry holds no entries.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.lock("registry.is_empty")?.is_empty())
    }

    /// All entries, oldest registration first.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the lock is unusable.
    pub fn snapshot(&self) -> QueueResult<Vec<TaskStatus>> {
        let entries = self.lock("registry.snapshot")?;
        let mut statuses: Vec<TaskStatus> = entries.values().cloned().collect();
        statuses.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(statuses)
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let entries = Arc::clone(&self.entries);
        let _ = std::thread::spawn(move || {
            let _guard = entries.lock();
            panic!("poison registry for test");
        })
        .join();
    }
}
