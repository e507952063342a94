//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Gauges are labelled by concurrency class so download and upload pools stay independent.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tgmirror_events::TaskClass;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    active_tasks: IntGaugeVec,
    queued_tasks: IntGaugeVec,
    admissions_total: IntCounterVec,
    woken_total: IntCounterVec,
    duplicates_rejected_total: IntCounter,
    dispatch_failures_total: IntCounter,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tasks holding a download slot.
    pub active_downloads: i64,
    /// Tasks holding an upload slot.
    pub active_uploads: i64,
    /// Tasks waiting for a download slot.
    pub queued_downloads: i64,
    /// Tasks waiting for an upload slot.
    pub queued_uploads: i64,
    /// Tasks rejected by the duplicate guard.
    pub duplicates_rejected_total: u64,
    /// Wake dispatch passes abandoned due to errors.
    pub dispatch_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let active_tasks = collector(
            "active_tasks",
            IntGaugeVec::new(
                Opts::new("active_tasks", "Tasks currently holding a slot"),
                &["class"],
            ),
        )?;
        let queued_tasks = collector(
            "queued_tasks",
            IntGaugeVec::new(
                Opts::new("queued_tasks", "Tasks waiting for a slot"),
                &["class"],
            ),
        )?;
        let admissions_total = collector(
            "admissions_total",
            IntCounterVec::new(
                Opts::new("admissions_total", "Admission decisions by outcome"),
                &["class", "outcome"],
            ),
        )?;
        let woken_total = collector(
            "woken_tasks_total",
            IntCounterVec::new(
                Opts::new("woken_tasks_total", "Queued tasks woken by the dispatcher"),
                &["class"],
            ),
        )?;
        let duplicates_rejected_total = collector(
            "duplicates_rejected_total",
            IntCounter::with_opts(Opts::new(
                "duplicates_rejected_total",
                "Tasks rejected before admission as duplicates",
            )),
        )?;
        let dispatch_failures_total = collector(
            "dispatch_failures_total",
            IntCounter::with_opts(Opts::new(
                "dispatch_failures_total",
                "Wake dispatch passes abandoned after an error",
            )),
        )?;

        register(&registry, "active_tasks", &active_tasks)?;
        register(&registry, "queued_tasks", &queued_tasks)?;
        register(&registry, "admissions_total", &admissions_total)?;
        register(&registry, "woken_tasks_total", &woken_total)?;
        register(
            &registry,
            "duplicates_rejected_total",
            &duplicates_rejected_total,
        )?;
        register(&registry, "dispatch_failures_total", &dispatch_failures_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                active_tasks,
                queued_tasks,
                admissions_total,
                woken_total,
                duplicates_rejected_total,
                dispatch_failures_total,
            }),
        })
    }

    /// Set the number of slot holders for a class.
    pub fn set_active(&self, class: TaskClass, count: usize) {
        self.inner
            .active_tasks
            .with_label_values(&[class.as_str()])
            .set(to_i64(count));
    }

    /// Set the queue depth for a class.
    pub fn set_queued(&self, class: TaskClass, depth: usize) {
        self.inner
            .queued_tasks
            .with_label_values(&[class.as_str()])
            .set(to_i64(depth));
    }

    /// Count an admission decision (`granted` or `queued`).
    pub fn inc_admission(&self, class: TaskClass, outcome: &str) {
        self.inner
            .admissions_total
            .with_label_values(&[class.as_str(), outcome])
            .inc();
    }

    /// Count a queued task woken by the dispatcher.
    pub fn inc_woken(&self, class: TaskClass) {
        self.inner
            .woken_total
            .with_label_values(&[class.as_str()])
            .inc();
    }

    /// Count a duplicate rejection.
    pub fn inc_duplicate_rejected(&self) {
        self.inner.duplicates_rejected_total.inc();
    }

    /// Count an abandoned dispatch pass.
    pub fn inc_dispatch_failure(&self) {
        self.inner.dispatch_failures_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the queue gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let active = |class: TaskClass| {
            self.inner
                .active_tasks
                .with_label_values(&[class.as_str()])
                .get()
        };
        let queued = |class: TaskClass| {
            self.inner
                .queued_tasks
                .with_label_values(&[class.as_str()])
                .get()
        };
        MetricsSnapshot {
            active_downloads: active(TaskClass::Download),
            active_uploads: active(TaskClass::Upload),
            queued_downloads: queued(TaskClass::Download),
            queued_uploads: queued(TaskClass::Upload),
            duplicates_rejected_total: self.inner.duplicates_rejected_total.get(),
            dispatch_failures_total: self.inner.dispatch_failures_total.get(),
        }
    }
}

fn collector<C>(name: &'static str, built: prometheus::Result<C>) -> Result<C> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.set_active(TaskClass::Download, 2);
        metrics.set_queued(TaskClass::Download, 3);
        metrics.set_active(TaskClass::Upload, 1);
        metrics.inc_admission(TaskClass::Download, "queued");
        metrics.inc_woken(TaskClass::Download);
        metrics.inc_duplicate_rejected();
        metrics.inc_dispatch_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_downloads, 2);
        assert_eq!(snapshot.queued_downloads, 3);
        assert_eq!(snapshot.active_uploads, 1);
        assert_eq!(snapshot.queued_uploads, 0);
        assert_eq!(snapshot.duplicates_rejected_total, 1);
        assert_eq!(snapshot.dispatch_failures_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("active_tasks"));
        assert!(rendered.contains("admissions_total"));
        assert!(rendered.contains("dispatch_failures_total"));
        Ok(())
    }

    #[test]
    fn independent_registries_do_not_collide() -> anyhow::Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.set_active(TaskClass::Upload, 4);
        assert_eq!(second.snapshot().active_uploads, 0);
        Ok(())
    }
}
