//! Span helpers for application and per-task context.
//!
//! # Design
//! - Provides an application-level span guard so top-level spans carry mode/build info.
//! - Gives every task pipeline a span carrying its identifier and source kind.

use std::fmt::Display;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Record the current application mode on the active span.
pub fn record_app_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}

/// Span wrapping a single task's pipeline.
#[must_use]
pub fn task_span(task_id: impl Display, source: &str) -> Span {
    tracing::info_span!("task", task_id = %task_id, source = source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_guard_sets_app_mode_field() {
        let guard = GlobalContextGuard::new("test");
        record_app_mode("active");
        drop(guard);
    }

    #[test]
    fn task_span_can_be_entered() {
        let span = task_span(42, "torrent");
        let _entered = span.enter();
    }
}
