//! Validation helpers and parsing utilities for configuration values.

use crate::error::{ConfigError, ConfigResult};
use crate::model::LogFormatSetting;

const KNOWN_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub(crate) fn parse_limit(raw: &str, section: &'static str, field: &'static str) -> ConfigResult<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "must be a non-negative integer",
        })
}

pub(crate) fn parse_flag(raw: &str, section: &'static str, field: &'static str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "must be a boolean flag",
        }),
    }
}

pub(crate) fn parse_log_format(raw: &str) -> ConfigResult<LogFormatSetting> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(LogFormatSetting::Auto),
        "pretty" => Ok(LogFormatSetting::Pretty),
        "json" => Ok(LogFormatSetting::Json),
        _ => Err(ConfigError::InvalidField {
            section: "logging",
            field: "format",
            value: Some(raw.to_string()),
            reason: "must be one of auto, pretty, json",
        }),
    }
}

/// Accepts a bare level name; full `EnvFilter` directives belong in `RUST_LOG`.
pub(crate) fn validate_log_level(raw: &str) -> ConfigResult<String> {
    let level = raw.trim().to_ascii_lowercase();
    if KNOWN_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::InvalidField {
            section: "logging",
            field: "level",
            value: Some(raw.to_string()),
            reason: "must be one of trace, debug, info, warn, error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_limit_accepts_zero_and_rejects_negative() {
        assert_eq!(parse_limit(" 0 ", "queue", "download_limit").ok(), Some(0));
        assert_eq!(parse_limit("4", "queue", "download_limit").ok(), Some(4));
        let err = parse_limit("-1", "queue", "download_limit").expect_err("negative limit");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "download_limit",
                ..
            }
        ));
    }

    #[test]
    fn parse_flag_handles_truthy_and_falsey() {
        assert!(parse_flag("True", "tasks", "stop_duplicate").unwrap_or(false));
        assert!(!parse_flag("off", "tasks", "stop_duplicate").unwrap_or(true));
        assert!(parse_flag("maybe", "tasks", "stop_duplicate").is_err());
    }

    #[test]
    fn log_helpers_validate_inputs() {
        assert_eq!(parse_log_format("JSON").ok(), Some(LogFormatSetting::Json));
        assert!(parse_log_format("xml").is_err());
        assert_eq!(validate_log_level("Debug").ok().as_deref(), Some("debug"));
        assert!(validate_log_level("loud").is_err());
    }
}
