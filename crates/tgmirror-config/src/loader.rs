//! Configuration sources: process environment and JSON documents.
//!
//! # Design
//! - Environment lookup is injected so tests never mutate process state.
//! - Empty variables fall back to defaults, matching how the bot treats blank settings.
//! - Every source funnels through `BotConfig::validate`.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::BotConfig;
use crate::validate::{parse_flag, parse_limit, parse_log_format, validate_log_level};

/// Environment variable holding the download concurrency limit.
pub const ENV_QUEUE_DOWNLOAD: &str = "QUEUE_DOWNLOAD";
/// Environment variable holding the upload concurrency limit.
pub const ENV_QUEUE_UPLOAD: &str = "QUEUE_UPLOAD";
/// Environment variable toggling the duplicate guard.
pub const ENV_STOP_DUPLICATE: &str = "STOP_DUPLICATE";
/// Environment variable toggling interactive torrent file selection.
pub const ENV_BT_SELECT: &str = "BT_SELECT";
/// Environment variable holding the fallback log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Environment variable holding the log output format.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` when a variable holds an unparsable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = read(ENV_QUEUE_DOWNLOAD) {
            config.queue.download_limit = parse_limit(&raw, "queue", "download_limit")?;
        }
        if let Some(raw) = read(ENV_QUEUE_UPLOAD) {
            config.queue.upload_limit = parse_limit(&raw, "queue", "upload_limit")?;
        }
        if let Some(raw) = read(ENV_STOP_DUPLICATE) {
            config.tasks.stop_duplicate = parse_flag(&raw, "tasks", "stop_duplicate")?;
        }
        if let Some(raw) = read(ENV_BT_SELECT) {
            config.tasks.select_files = parse_flag(&raw, "tasks", "select_files")?;
        }
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.logging.level = raw;
        }
        if let Some(raw) = read(ENV_LOG_FORMAT) {
            config.logging.format = parse_log_format(&raw)?;
        }

        config.validate()
    }

    /// Parse configuration from a JSON document; missing sections use defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and
    /// `ConfigError::InvalidField` for values that fail validation.
    pub fn from_json_str(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        config.validate()
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// errors of [`BotConfig::from_json_str`].
    pub fn from_json_path(path: &Path) -> ConfigResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "config.read",
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration document");
        Self::from_json_str(&document)
    }

    fn validate(mut self) -> ConfigResult<Self> {
        self.logging.level = validate_log_level(&self.logging.level)?;
        Ok(self)
    }
}
