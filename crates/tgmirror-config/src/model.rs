//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; loading and validation live in `loader.rs`.
//! - A limit of `0` means the class is unlimited.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tgmirror_events::TaskClass;

use crate::defaults;

/// Complete bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Per-class concurrency limits.
    pub queue: QueuePolicy,
    /// Task-level behaviour toggles.
    pub tasks: TaskPolicy,
    /// Logging output configuration.
    pub logging: LogSettings,
}

/// Per-class concurrency limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuePolicy {
    /// Maximum simultaneous downloads (`0` = unlimited).
    pub download_limit: u32,
    /// Maximum simultaneous uploads (`0` = unlimited).
    pub upload_limit: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            download_limit: defaults::DOWNLOAD_LIMIT,
            upload_limit: defaults::UPLOAD_LIMIT,
        }
    }
}

impl QueuePolicy {
    /// Unlimited in both classes.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            download_limit: 0,
            upload_limit: 0,
        }
    }

    /// Effective limit for a class, `None` when unlimited.
    #[must_use]
    pub fn limit_for(&self, class: TaskClass) -> Option<NonZeroUsize> {
        let raw = match class {
            TaskClass::Download => self.download_limit,
            TaskClass::Upload => self.upload_limit,
        };
        usize::try_from(raw).ok().and_then(NonZeroUsize::new)
    }
}

/// Task-level behaviour toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPolicy {
    /// Reject tasks whose source is already in flight or completed for the requester.
    pub stop_duplicate: bool,
    /// Allow requesters to pick torrent files before the download starts.
    pub select_files: bool,
}

/// Logging output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Fallback level when `RUST_LOG` is not set.
    pub level: String,
    /// Output format.
    pub format: LogFormatSetting,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: LogFormatSetting::default(),
        }
    }
}

/// Output format requested in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Pick based on build profile.
    #[default]
    Auto,
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}
