//! One-shot wake signal shared between a queued task and the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tgmirror_core::CancellationFlag;
use tokio::sync::Notify;

/// Waitable signal. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct WaitHandle {
    inner: Arc<WaitInner>,
}

#[derive(Debug, Default)]
struct WaitInner {
    set: AtomicBool,
    notify: Notify,
}

impl WaitHandle {
    /// Fresh, unset handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake every waiter. Returns `false` if it was
    /// already set.
    pub fn set(&self) -> bool {
        let first = self
            .inner
            .set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Non-blocking poll.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Resolve once the signal is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a concurrent `set` cannot slip between.
            let notified = self.inner.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Why a queued task stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The dispatcher reserved a slot for the task.
    Woken,
    /// The requester cancelled first.
    Cancelled,
}

/// Block until `handle` is set or `cancellation` fires, whichever comes first.
///
/// Cancellation wins when both are already observable.
pub async fn wait_for_slot(handle: &WaitHandle, cancellation: &CancellationFlag) -> WakeOutcome {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => WakeOutcome::Cancelled,
        () = handle.wait() => WakeOutcome::Woken,
    }
}
