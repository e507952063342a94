use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tgmirror_config::QueuePolicy;
use tgmirror_core::{TaskDescriptor, TaskSource, TaskStatus};
use tgmirror_events::{TaskClass, TaskPhase};
use tgmirror_queue::{
    Admission, DuplicateGuard, QueueController, QueueError, TaskRegistry, WakeOutcome,
    wait_for_slot,
};
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

fn controller(download_limit: u32) -> QueueController {
    QueueController::new(&QueuePolicy {
        download_limit,
        upload_limit: 0,
    })
}

fn task(link: &str) -> Result<TaskDescriptor> {
    Ok(TaskDescriptor::new(42, TaskSource::parse(link)?))
}

fn numbered(index: usize) -> Result<TaskDescriptor> {
    task(&format!("https://example.com/file-{index}.bin"))
}

fn queued_handle(admission: &Admission) -> Result<tgmirror_queue::WaitHandle> {
    admission
        .wait_handle()
        .cloned()
        .context("expected a queued admission")
}

/// Adapter-side completion: drop the entry, then hand the slot on.
fn complete(controller: &QueueController, task: &TaskDescriptor) -> Result<Vec<Uuid>> {
    controller.unregister(task.id)?;
    Ok(controller.finish(task.id, TaskClass::Download)?)
}

#[tokio::test]
async fn single_slot_hands_over_to_queued_task() -> Result<()> {
    let controller = controller(1);
    let t1 = numbered(1)?;
    let t2 = numbered(2)?;

    let first = controller.request_admission(&t1, TaskClass::Download)?;
    assert!(!first.must_queue());
    controller.activate(&t1, TaskClass::Download, None)?;

    let second = controller.request_admission(&t2, TaskClass::Download)?;
    assert!(second.must_queue());
    let handle = queued_handle(&second)?;

    let woken = complete(&controller, &t1)?;
    assert_eq!(woken, vec![t2.id]);

    let outcome = timeout(WAIT, wait_for_slot(&handle, &t2.cancellation)).await?;
    assert_eq!(outcome, WakeOutcome::Woken);
    controller.activate(&t2, TaskClass::Download, None)?;

    let statuses = controller.registry().snapshot()?;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].task_id, t2.id);
    assert_eq!(statuses[0].phase, TaskPhase::ActiveDownload);
    Ok(())
}

#[tokio::test]
async fn cancelled_waiter_is_skipped_and_leaves_no_trace() -> Result<()> {
    let controller = controller(2);
    let tasks = [numbered(1)?, numbered(2)?, numbered(3)?];

    let mut admissions = Vec::new();
    for task in &tasks {
        admissions.push(controller.request_admission(task, TaskClass::Download)?);
    }
    controller.activate(&tasks[0], TaskClass::Download, None)?;
    controller.activate(&tasks[1], TaskClass::Download, None)?;
    let handle = queued_handle(&admissions[2])?;

    tasks[2].cancellation.cancel();
    let woken = complete(&controller, &tasks[0])?;
    assert!(woken.is_empty());
    assert!(!handle.is_set());

    let outcome = timeout(WAIT, wait_for_slot(&handle, &tasks[2].cancellation)).await?;
    assert_eq!(outcome, WakeOutcome::Cancelled);
    controller.withdraw(tasks[2].id)?;

    let statuses = controller.registry().snapshot()?;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].task_id, tasks[1].id);
    assert_eq!(statuses[0].phase, TaskPhase::ActiveDownload);

    let pool = controller.snapshot(TaskClass::Download)?;
    assert_eq!(pool.running, vec![tasks[1].id]);
    assert!(pool.queued.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancelled_waiter_does_not_block_the_next_one() -> Result<()> {
    let controller = controller(1);
    let holder = numbered(0)?;
    let cancelled = numbered(1)?;
    let next = numbered(2)?;

    controller.request_admission(&holder, TaskClass::Download)?;
    controller.request_admission(&cancelled, TaskClass::Download)?;
    let next_handle = queued_handle(&controller.request_admission(&next, TaskClass::Download)?)?;

    cancelled.cancellation.cancel();
    let woken = complete(&controller, &holder)?;
    assert_eq!(woken, vec![next.id]);
    assert!(next_handle.is_set());
    Ok(())
}

#[tokio::test]
async fn queued_tasks_wake_in_arrival_order() -> Result<()> {
    let controller = controller(1);
    let holder = numbered(0)?;
    controller.request_admission(&holder, TaskClass::Download)?;

    let queued: Vec<TaskDescriptor> = (1..=5).map(numbered).collect::<Result<_>>()?;
    for task in &queued {
        assert!(controller
            .request_admission(task, TaskClass::Download)?
            .must_queue());
    }

    let mut order = complete(&controller, &holder)?;
    for task in &queued {
        order.extend(complete(&controller, task)?);
    }

    let expected: Vec<Uuid> = queued.iter().map(|task| task.id).collect();
    assert_eq!(order, expected);
    Ok(())
}

#[tokio::test]
async fn duplicate_is_rejected_before_admission() -> Result<()> {
    let controller = controller(1);
    let guard = DuplicateGuard::new(controller.registry().clone(), true);

    let original = task("magnet:?xt=urn:btih:feedface&dn=original")?;
    guard.check(&original)?;
    controller.request_admission(&original, TaskClass::Download)?;
    controller.activate(&original, TaskClass::Download, None)?;

    let repeat = task("magnet:?xt=urn:btih:FEEDFACE")?;
    let err = guard.check(&repeat).err().context("duplicate accepted")?;
    assert!(matches!(err, QueueError::DuplicateTask { .. }));
    assert!(err.is_informational());

    assert!(controller.registry().get(repeat.id)?.is_none());
    let pool = controller.snapshot(TaskClass::Download)?;
    assert_eq!(pool.running, vec![original.id]);
    assert!(pool.queued.is_empty());
    Ok(())
}

#[tokio::test]
async fn download_and_upload_pools_are_independent() -> Result<()> {
    let controller = QueueController::new(&QueuePolicy {
        download_limit: 1,
        upload_limit: 1,
    });
    let a = numbered(1)?;
    let b = numbered(2)?;

    controller.request_admission(&a, TaskClass::Download)?;
    controller.activate(&a, TaskClass::Download, None)?;
    assert!(controller
        .request_admission(&b, TaskClass::Download)?
        .must_queue());

    // `a` moves on to upload while still holding its download slot.
    assert!(!controller
        .request_admission(&a, TaskClass::Upload)?
        .must_queue());
    controller.activate(&a, TaskClass::Upload, None)?;
    assert_eq!(controller.finish(a.id, TaskClass::Download)?, vec![b.id]);

    let uploads = controller.snapshot(TaskClass::Upload)?;
    assert_eq!(uploads.running, vec![a.id]);
    Ok(())
}

#[tokio::test]
async fn registry_survives_concurrent_insert_and_remove() -> Result<()> {
    let registry = TaskRegistry::new();
    let mut joins = Vec::new();
    for index in 0..64 {
        let registry = registry.clone();
        joins.push(tokio::spawn(async move {
            let task = numbered(index)?;
            let status = TaskStatus::new(&task, TaskPhase::ActiveDownload);
            registry.insert(status.clone())?;
            let fetched = registry.get(task.id)?;
            if fetched.as_ref() != Some(&status) {
                bail!("entry for {} changed under concurrent access", task.id);
            }
            if index % 2 == 0 {
                registry.remove(task.id)?;
                if registry.get(task.id)?.is_some() {
                    bail!("entry for {} survived removal", task.id);
                }
            }
            Ok::<_, anyhow::Error>(())
        }));
    }
    for join in joins {
        join.await??;
    }
    assert_eq!(registry.len()?, 32);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_tasks_never_exceed_limit() -> Result<()> {
    const LIMIT: usize = 3;
    let controller = Arc::new(controller(3));
    let peak = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(Mutex::new(Vec::new()));

    let mut joins = Vec::new();
    for index in 0..24 {
        let controller = Arc::clone(&controller);
        let peak = Arc::clone(&peak);
        let finished = Arc::clone(&finished);
        joins.push(tokio::spawn(async move {
            let task = numbered(index)?;
            let admission = controller.request_admission(&task, TaskClass::Download)?;
            if let Some(handle) = admission.wait_handle() {
                if wait_for_slot(handle, &task.cancellation).await != WakeOutcome::Woken {
                    bail!("task {index} was not woken");
                }
            }
            controller.activate(&task, TaskClass::Download, None)?;
            let active = controller
                .registry()
                .count_in_phase(TaskPhase::ActiveDownload)?;
            peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            complete(&controller, &task)?;
            finished.lock().await.push(task.id);
            Ok::<_, anyhow::Error>(())
        }));
    }
    for join in joins {
        timeout(Duration::from_secs(10), join).await???;
    }

    assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    assert_eq!(finished.lock().await.len(), 24);
    assert!(controller.registry().is_empty()?);
    let pool = controller.snapshot(TaskClass::Download)?;
    assert!(pool.running.is_empty() && pool.queued.is_empty());
    Ok(())
}
