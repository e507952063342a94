//! Fallback values applied when a setting is absent.

/// Download concurrency when unset (0 = unlimited).
pub(crate) const DOWNLOAD_LIMIT: u32 = 0;
/// Upload concurrency when unset (0 = unlimited).
pub(crate) const UPLOAD_LIMIT: u32 = 0;
/// Default tracing level.
pub(crate) const LOG_LEVEL: &str = "info";
