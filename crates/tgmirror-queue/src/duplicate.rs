//! Rejection of tasks that repeat a payload for the same requester.
//!
//! # Design
//!
//! - In-flight duplicates are found through the shared registry.
//! - An accepted task reserves its payload until `release`, so two concurrent
//!   checks for the same payload cannot both pass.
//! - Completed payloads are kept in a bounded ledger, oldest evicted first.
//! - Disabled guards accept everything.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tgmirror_core::TaskDescriptor;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::registry::TaskRegistry;

/// Completed payloads remembered per guard.
pub const DEFAULT_LEDGER_CAPACITY: usize = 1024;

type LedgerKey = (i64, String);

#[derive(Debug, Default)]
struct Ledger {
    order: VecDeque<LedgerKey>,
    keys: HashSet<LedgerKey>,
    reserved: HashMap<LedgerKey, Uuid>,
}

/// Duplicate check run before admission.
#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    registry: TaskRegistry,
    enabled: bool,
    capacity: usize,
    completed: Arc<Mutex<Ledger>>,
}

impl DuplicateGuard {
    /// Guard reading in-flight tasks from `registry`.
    #[must_use]
    pub fn new(registry: TaskRegistry, enabled: bool) -> Self {
        Self::with_capacity(registry, enabled, DEFAULT_LEDGER_CAPACITY)
    }

    /// Guard remembering at most `capacity` completed payloads.
    #[must_use]
    pub fn with_capacity(registry: TaskRegistry, enabled: bool, capacity: usize) -> Self {
        Self {
            registry,
            enabled,
            capacity,
            completed: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Whether the guard rejects anything at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn ledger(&self, operation: &'static str) -> QueueResult<MutexGuard<'_, Ledger>> {
        self.completed
            .lock()
            .map_err(|_| QueueError::RegistryPoisoned { operation })
    }

    /// Accept `task` or explain why it duplicates earlier work. An accepted
    /// task holds its payload until [`DuplicateGuard::release`].
    ///
    /// # Errors
    ///
    /// Returns `QueueError::DuplicateTask` with a message for the requester,
    /// or `QueueError::RegistryPoisoned` when state cannot be read.
    pub fn check(&self, task: &TaskDescriptor) -> QueueResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = task.source.dedup_key();
        let mut ledger = self.ledger("duplicate.check")?;

        let in_flight = self.registry.find(|status| {
            status.task_id != task.id
                && status.requester_id == task.requester_id
                && status.source_key == key
        })?;
        if let Some(existing) = in_flight {
            info!(task_id = %task.id, existing = %existing.task_id, "duplicate of in-flight task");
            return Err(QueueError::DuplicateTask {
                task_id: task.id,
                message: format!("{} is already being mirrored.", existing.name),
            });
        }

        let key = (task.requester_id, key);
        if let Some(holder) = ledger.reserved.get(&key).filter(|holder| **holder != task.id) {
            info!(task_id = %task.id, existing = %holder, "duplicate of accepted task");
            return Err(QueueError::DuplicateTask {
                task_id: task.id,
                message: format!("{} is already being mirrored.", task.display_name()),
            });
        }
        if ledger.keys.contains(&key) {
            info!(task_id = %task.id, "duplicate of completed task");
            return Err(QueueError::DuplicateTask {
                task_id: task.id,
                message: format!("{} has already been mirrored.", task.display_name()),
            });
        }
        ledger.reserved.insert(key, task.id);
        Ok(())
    }

    /// Drop the payload reservation taken by `task` in `check`. Reservations
    /// held by other tasks are left alone.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the ledger lock is unusable.
    pub fn release(&self, task: &TaskDescriptor) -> QueueResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = (task.requester_id, task.source.dedup_key());
        let mut ledger = self.ledger("duplicate.release")?;
        if ledger.reserved.get(&key) == Some(&task.id) {
            ledger.reserved.remove(&key);
            debug!(task_id = %task.id, "payload reservation released");
        }
        Ok(())
    }

    /// Remember that `task` completed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::RegistryPoisoned` when the ledger lock is unusable.
    pub fn record_completed(&self, task: &TaskDescriptor) -> QueueResult<()> {
        if !self.enabled || self.capacity == 0 {
            return Ok(());
        }
        let key = (task.requester_id, task.source.dedup_key());
        let mut ledger = self.ledger("duplicate.record_completed")?;
        if !ledger.keys.insert(key.clone()) {
            return Ok(());
        }
        ledger.order.push_back(key);
        while ledger.order.len() > self.capacity {
            if let Some(evicted) = ledger.order.pop_front() {
                ledger.keys.remove(&evicted);
            }
        }
        Ok(())
    }
}
