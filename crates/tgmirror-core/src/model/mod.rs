//! Core task domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tgmirror_events::{TaskClass, TaskPhase};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{TaskError, TaskResult};

/// Transfer engine a source is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Magnet URI or `.torrent` metainfo handled by the torrent client.
    Torrent,
    /// File or folder hosted on Google Drive.
    GoogleDrive,
    /// Plain HTTP(S) link.
    DirectLink,
}

impl SourceKind {
    /// Classify a link by its shape.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidSource` when the link is blank.
    pub fn detect(link: &str) -> TaskResult<Self> {
        let trimmed = link.trim();
        if trimmed.is_empty() {
            return Err(TaskError::InvalidSource {
                link: link.to_string(),
                reason: "link is empty",
            });
        }
        let lower = trimmed.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or(lower.as_str());
        if lower.starts_with("magnet:") || path.ends_with(".torrent") {
            Ok(Self::Torrent)
        } else if lower.contains("drive.google.com") || lower.contains("docs.google.com") {
            Ok(Self::GoogleDrive)
        } else {
            Ok(Self::DirectLink)
        }
    }

    /// Label used in logs and spans.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Torrent => "torrent",
            Self::GoogleDrive => "gdrive",
            Self::DirectLink => "direct",
        }
    }
}

/// Where a task's payload comes from. Opaque to the queue controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSource {
    /// Engine the link is routed to.
    pub kind: SourceKind,
    /// Link or local path as supplied by the requester.
    pub link: String,
}

impl TaskSource {
    /// Classify and wrap a link.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidSource` when the link is blank.
    pub fn parse(link: impl Into<String>) -> TaskResult<Self> {
        let link = link.into();
        let kind = SourceKind::detect(&link)?;
        Ok(Self {
            kind,
            link: link.trim().to_string(),
        })
    }

    /// Stable key identifying the payload regardless of link decoration.
    ///
    /// Magnets reduce to their info hash, Drive links to their file id.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let key = match self.kind {
            SourceKind::Torrent => magnet_info_hash(&self.link),
            SourceKind::GoogleDrive => drive_file_id(&self.link),
            SourceKind::DirectLink => None,
        };
        key.unwrap_or_else(|| self.link.trim_end_matches('/').to_string())
    }
}

fn magnet_info_hash(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("xt=urn:btih:")?;
    let hash = rest.split('&').next()?;
    (!hash.is_empty()).then(|| hash.to_ascii_lowercase())
}

fn drive_file_id(link: &str) -> Option<String> {
    if let Some((_, rest)) = link.split_once("id=") {
        return rest
            .split('&')
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }
    let (_, rest) = link.split_once("/d/")?;
    rest.split(['/', '?'])
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Observable cancellation flag attached to a task.
///
/// Setting the flag is immediate; observers see it at their next check or
/// wake up from [`CancellationFlag::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    token: CancellationToken,
}

impl CancellationFlag {
    /// Fresh, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking poll.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the flag is set.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Name and size resolved from a source before admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Display name of the payload.
    pub name: String,
    /// Total size in bytes when the engine knows it.
    pub size_bytes: Option<u64>,
}

/// One user-initiated mirror or leech request.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Identifier, stable for the task's lifetime.
    pub id: Uuid,
    /// Chat user that issued the request.
    pub requester_id: i64,
    /// Payload source.
    pub source: TaskSource,
    /// Requested or resolved display name.
    pub name: Option<String>,
    /// Payload size once resolved.
    pub size_bytes: Option<u64>,
    /// Number of items in the batch this task belongs to.
    pub multi: u32,
    /// Whether the requester asked to pick files before downloading.
    pub select_files: bool,
    /// Flag set when the requester cancels.
    pub cancellation: CancellationFlag,
}

impl TaskDescriptor {
    /// New single-item task with a random identifier.
    #[must_use]
    pub fn new(requester_id: i64, source: TaskSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            source,
            name: None,
            size_bytes: None,
            multi: 1,
            select_files: false,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Override the identifier.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Mark the task as part of a batch of `multi` items.
    #[must_use]
    pub fn with_multi(mut self, multi: u32) -> Self {
        self.multi = multi;
        self
    }

    /// Request interactive file selection.
    #[must_use]
    pub fn with_file_selection(mut self, select_files: bool) -> Self {
        self.select_files = select_files;
        self
    }

    /// Fill in resolved metadata; a name supplied by the requester wins.
    pub fn apply_metadata(&mut self, metadata: SourceMetadata) {
        if self.name.is_none() {
            self.name = Some(metadata.name);
        }
        self.size_bytes = metadata.size_bytes.or(self.size_bytes);
    }

    /// Name for status output, falling back to the link.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.source.link)
    }

    /// Batched items share a single status message.
    #[must_use]
    pub const fn suppresses_status(&self) -> bool {
        self.multi > 1
    }

    /// Whether the requester has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Registered entry describing a task's current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Owning task.
    pub task_id: Uuid,
    /// Chat user that issued the request.
    pub requester_id: i64,
    /// Display name.
    pub name: String,
    /// Engine serving the task.
    pub source_kind: SourceKind,
    /// Payload key used by the duplicate guard.
    pub source_key: String,
    /// Current lifecycle phase.
    pub phase: TaskPhase,
    /// Payload size when known.
    pub size_bytes: Option<u64>,
    /// Engine-specific handle (torrent hash, Drive gid, ...).
    pub backend_ref: Option<String>,
    /// When the entry was first registered.
    pub created_at: DateTime<Utc>,
    /// When the phase last changed.
    pub updated_at: DateTime<Utc>,
}

impl TaskStatus {
    /// Build a status entry for `descriptor` in `phase`.
    #[must_use]
    pub fn new(descriptor: &TaskDescriptor, phase: TaskPhase) -> Self {
        let now = Utc::now();
        Self {
            task_id: descriptor.id,
            requester_id: descriptor.requester_id,
            name: descriptor.display_name().to_string(),
            source_kind: descriptor.source.kind,
            source_key: descriptor.source.dedup_key(),
            phase,
            size_bytes: descriptor.size_bytes,
            backend_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach an engine handle.
    #[must_use]
    pub fn with_backend_ref(mut self, backend_ref: impl Into<String>) -> Self {
        self.backend_ref = Some(backend_ref.into());
        self
    }

    /// Class whose slot the phase relates to.
    #[must_use]
    pub const fn class(&self) -> Option<TaskClass> {
        self.phase.class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_classifies_links() {
        assert_eq!(
            SourceKind::detect("magnet:?xt=urn:btih:ABC").ok(),
            Some(SourceKind::Torrent)
        );
        assert_eq!(
            SourceKind::detect("https://host/file.torrent?dl=1").ok(),
            Some(SourceKind::Torrent)
        );
        assert_eq!(
            SourceKind::detect("https://drive.google.com/file/d/xyz/view").ok(),
            Some(SourceKind::GoogleDrive)
        );
        assert_eq!(
            SourceKind::detect("https://example.com/a.zip").ok(),
            Some(SourceKind::DirectLink)
        );
        assert!(matches!(
            SourceKind::detect("   "),
            Err(TaskError::InvalidSource { .. })
        ));
    }

    #[test]
    fn dedup_key_normalises_known_sources() -> TaskResult<()> {
        let magnet = TaskSource::parse("magnet:?xt=urn:btih:ABCDEF&dn=name")?;
        assert_eq!(magnet.dedup_key(), "abcdef");

        let drive = TaskSource::parse("https://drive.google.com/file/d/FILE123/view?usp=sharing")?;
        assert_eq!(drive.dedup_key(), "FILE123");

        let drive_query = TaskSource::parse("https://drive.google.com/open?id=QID&x=1")?;
        assert_eq!(drive_query.dedup_key(), "QID");

        let direct = TaskSource::parse(" https://example.com/dir/ ")?;
        assert_eq!(direct.dedup_key(), "https://example.com/dir");
        Ok(())
    }

    #[test]
    fn metadata_does_not_override_requested_name() -> TaskResult<()> {
        let mut task = TaskDescriptor::new(7, TaskSource::parse("https://example.com/a.bin")?);
        task.apply_metadata(SourceMetadata {
            name: "a.bin".into(),
            size_bytes: Some(10),
        });
        assert_eq!(task.display_name(), "a.bin");
        assert_eq!(task.size_bytes, Some(10));

        let mut named = TaskDescriptor::new(7, TaskSource::parse("https://example.com/b.bin")?);
        named.name = Some("custom".into());
        named.apply_metadata(SourceMetadata {
            name: "b.bin".into(),
            size_bytes: None,
        });
        assert_eq!(named.display_name(), "custom");
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        observer.cancelled().await;
        assert!(observer.is_cancelled());
    }

    #[test]
    fn status_copies_descriptor_fields() -> TaskResult<()> {
        let task = TaskDescriptor::new(9, TaskSource::parse("magnet:?xt=urn:btih:FF")?)
            .with_multi(3);
        assert!(task.suppresses_status());
        let status = TaskStatus::new(&task, TaskPhase::QueuedDownload).with_backend_ref("ff");
        assert_eq!(status.task_id, task.id);
        assert_eq!(status.source_key, "ff");
        assert_eq!(status.class(), Some(TaskClass::Download));
        assert_eq!(status.backend_ref.as_deref(), Some("ff"));
        Ok(())
    }
}
