//! Shared application state built once at startup.

use std::sync::Arc;

use tgmirror_config::{BotConfig, LogFormatSetting};
use tgmirror_events::EventBus;
use tgmirror_queue::{DuplicateGuard, QueueController};
use tgmirror_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha, init_logging, record_app_mode,
};
use tracing::info;

use crate::backends::Backends;
use crate::error::{AppError, AppResult};
use crate::pipeline::TaskPipeline;

/// Controller, event bus and metrics shared by every task pipeline.
#[derive(Clone)]
pub struct AppContext {
    config: BotConfig,
    events: EventBus,
    metrics: Metrics,
    controller: Arc<QueueController>,
    guard: DuplicateGuard,
}

impl AppContext {
    /// Load configuration from the process environment and wire the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid settings or the
    /// metrics registry cannot be built.
    pub fn from_env() -> AppResult<Self> {
        let config =
            BotConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        Self::from_config(config)
    }

    /// Wire the context from an already loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be built.
    pub fn from_config(config: BotConfig) -> AppResult<Self> {
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let controller =
            Arc::new(QueueController::new(&config.queue).with_metrics(metrics.clone()));
        let guard = DuplicateGuard::new(
            controller.registry().clone(),
            config.tasks.stop_duplicate,
        );
        Ok(Self {
            config,
            events: EventBus::new(),
            metrics,
            controller,
            guard,
        })
    }

    /// Install the global subscriber and enter the application span.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init_telemetry(&self) -> AppResult<GlobalContextGuard> {
        init_logging(&self.logging_config())
            .map_err(|err| AppError::telemetry("telemetry.init", err))?;
        let guard = GlobalContextGuard::new("bootstrap");
        record_app_mode("mirror");
        info!(
            download_limit = self.config.queue.download_limit,
            upload_limit = self.config.queue.upload_limit,
            stop_duplicate = self.config.tasks.stop_duplicate,
            "mirror controller ready"
        );
        Ok(guard)
    }

    /// Logging settings derived from configuration.
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig<'_> {
        let format = match self.config.logging.format {
            LogFormatSetting::Auto => LogFormat::infer(),
            LogFormatSetting::Pretty => LogFormat::Pretty,
            LogFormatSetting::Json => LogFormat::Json,
        };
        LoggingConfig {
            level: &self.config.logging.level,
            format,
            build_sha: build_sha(),
        }
    }

    /// Pipeline driving tasks through `backends` with the shared controller.
    #[must_use]
    pub fn pipeline(&self, backends: Backends) -> TaskPipeline {
        TaskPipeline::new(
            Arc::clone(&self.controller),
            self.guard.clone(),
            backends,
            self.events.clone(),
            self.config.tasks,
        )
        .with_metrics(self.metrics.clone())
    }

    /// Loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Lifecycle event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shared controller.
    #[must_use]
    pub fn controller(&self) -> &QueueController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgmirror_events::TaskClass;

    #[test]
    fn context_reflects_configuration() -> AppResult<()> {
        let config = BotConfig::from_json_str(
            r#"{"queue":{"download_limit":2,"upload_limit":1},"tasks":{"stop_duplicate":true},"logging":{"format":"json"}}"#,
        )
        .map_err(|err| AppError::config("config.from_json_str", err))?;
        let context = AppContext::from_config(config)?;

        assert_eq!(
            context.controller().limit(TaskClass::Download).map(|n| n.get()),
            Some(2)
        );
        assert_eq!(
            context.controller().limit(TaskClass::Upload).map(|n| n.get()),
            Some(1)
        );
        assert_eq!(context.logging_config().format, LogFormat::Json);
        assert!(context.config().tasks.stop_duplicate);
        assert_eq!(context.metrics().snapshot().active_downloads, 0);
        assert!(context.events().last_event_id().is_none());
        Ok(())
    }

    #[test]
    fn from_env_wires_configured_limits() -> AppResult<()> {
        let context = AppContext::from_env()?;
        let limit = context.config().queue.limit_for(TaskClass::Download);
        assert_eq!(context.controller().limit(TaskClass::Download), limit);
        Ok(())
    }
}
