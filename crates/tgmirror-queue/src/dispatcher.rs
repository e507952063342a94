//! Wake dispatch for queued tasks.
//!
//! # Design
//!
//! - Runs whenever a slot holder finishes, fails or is cancelled.
//! - Wakes in arrival order and never more tasks than there are free slots.
//! - Reserves the slot before setting the handle, so a concurrent admission
//!   cannot take it between the wake and the woken task's re-registration.
//! - Failures end the pass with a log line; they never reach the caller.

use tgmirror_events::TaskClass;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::admission::ClassPool;
use crate::controller::QueueController;
use crate::error::QueueResult;

#[derive(Debug, Default)]
pub(crate) struct DispatchPass {
    pub(crate) woken: Vec<Uuid>,
    pub(crate) skipped: Vec<Uuid>,
}

impl ClassPool {
    /// Pop waiters while capacity remains, skipping abandoned ones.
    pub(crate) fn drain(&self) -> QueueResult<DispatchPass> {
        let mut state = self.lock()?;
        let mut pass = DispatchPass::default();
        while self.has_capacity(&state) {
            let Some(waiter) = state.waiting.pop_front() else {
                break;
            };
            if waiter.cancellation.is_cancelled() || waiter.handle.is_set() {
                pass.skipped.push(waiter.task_id);
                continue;
            }
            state.running.insert(waiter.task_id);
            waiter.handle.set();
            pass.woken.push(waiter.task_id);
        }
        drop(state);
        Ok(pass)
    }
}

impl QueueController {
    /// Wake as many queued tasks of `class` as there are free slots.
    ///
    /// Returns the identifiers of the woken tasks, front of the queue first.
    /// Errors are logged and counted; the pass is then abandoned.
    pub fn on_task_finished(&self, class: TaskClass) -> Vec<Uuid> {
        let pool = self.pool(class);
        let pass = match pool.drain() {
            Ok(pass) => pass,
            Err(err) => {
                error!(class = %pool.class(), error = %err, "wake dispatch abandoned");
                if let Some(metrics) = self.metrics() {
                    metrics.inc_dispatch_failure();
                }
                return Vec::new();
            }
        };

        for task_id in &pass.skipped {
            debug!(task_id = %task_id, class = %class, "skipped cancelled waiter");
        }
        for task_id in &pass.woken {
            info!(task_id = %task_id, class = %class, "woke queued task");
            if let Some(metrics) = self.metrics() {
                metrics.inc_woken(class);
            }
        }
        self.refresh_gauges(class);
        pass.woken
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::admission::Admission;
    use tgmirror_config::QueuePolicy;
    use tgmirror_core::{TaskDescriptor, TaskSource};
    use tgmirror_telemetry::Metrics;

    fn task() -> anyhow::Result<TaskDescriptor> {
        Ok(TaskDescriptor::new(
            3,
            TaskSource::parse("magnet:?xt=urn:btih:0011")?,
        ))
    }

    #[test]
    fn drain_wakes_only_free_slots() -> anyhow::Result<()> {
        let pool = ClassPool::new(TaskClass::Download, NonZeroUsize::new(2));
        let holders = [task()?, task()?];
        for holder in &holders {
            pool.admit(holder)?;
        }
        let waiters = [task()?, task()?, task()?];
        let mut handles = Vec::new();
        for waiter in &waiters {
            let Admission::Queued { handle, .. } = pool.admit(waiter)? else {
                anyhow::bail!("expected queued admission");
            };
            handles.push(handle);
        }

        assert!(pool.drain()?.woken.is_empty());

        pool.release(holders[0].id)?;
        let pass = pool.drain()?;
        assert_eq!(pass.woken, vec![waiters[0].id]);
        assert!(handles[0].is_set());
        assert!(!handles[1].is_set());
        assert_eq!(pool.counts()?, (2, 2));
        Ok(())
    }

    #[test]
    fn drain_skips_cancelled_waiters() -> anyhow::Result<()> {
        let pool = ClassPool::new(TaskClass::Upload, NonZeroUsize::new(1));
        let holder = task()?;
        pool.admit(&holder)?;
        let abandoned = task()?;
        let next = task()?;
        pool.admit(&abandoned)?;
        pool.admit(&next)?;
        abandoned.cancellation.cancel();

        pool.release(holder.id)?;
        let pass = pool.drain()?;
        assert_eq!(pass.skipped, vec![abandoned.id]);
        assert_eq!(pass.woken, vec![next.id]);
        assert_eq!(pool.counts()?, (1, 0));
        Ok(())
    }

    #[test]
    fn poisoned_pool_abandons_dispatch_and_counts_failure() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let controller = QueueController::new(&QueuePolicy {
            download_limit: 1,
            upload_limit: 0,
        })
        .with_metrics(metrics.clone());
        let (holder, waiter) = (task()?, task()?);
        controller.request_admission(&holder, TaskClass::Download)?;
        let admission = controller.request_admission(&waiter, TaskClass::Download)?;
        let Some(handle) = admission.wait_handle() else {
            anyhow::bail!("expected queued admission");
        };

        controller.pool(TaskClass::Download).poison();
        assert!(controller.on_task_finished(TaskClass::Download).is_empty());
        assert_eq!(metrics.snapshot().dispatch_failures_total, 1);
        assert!(!handle.is_set());
        Ok(())
    }
}
