//! Backend traits implemented by the transfer engines.
//!
//! The torrent client, the cloud-storage SDK and the direct-link fetcher each
//! implement [`TransferBackend`]; the chat upload path implements
//! [`UploadBackend`]. The queue controller never calls these directly, the
//! adapter pipeline does.

use crate::model::{SourceKind, SourceMetadata, TaskDescriptor, TaskSource};
use anyhow::bail;
use async_trait::async_trait;

/// Download side of a transfer engine.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Source kind served by this backend.
    fn kind(&self) -> SourceKind;

    /// Resolve name and size before a slot is requested.
    async fn resolve_metadata(&self, source: &TaskSource) -> anyhow::Result<SourceMetadata>;

    /// Engine handle recorded on the task's status entry, if any.
    fn session_ref(&self, task: &TaskDescriptor) -> Option<String> {
        let _ = task;
        None
    }

    /// Run the transfer to completion.
    async fn download(&self, task: &TaskDescriptor) -> anyhow::Result<()>;

    /// Wait until the requester finished picking files; default reports lack of support.
    async fn await_selection(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        let _ = task;
        bail!("file selection not supported by this engine");
    }

    /// Remove transient local resources. Called on every exit path.
    async fn cleanup(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        let _ = task;
        Ok(())
    }
}

/// Upload side of the pipeline (chat upload or cloud mirror).
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Push the downloaded payload to its destination.
    async fn upload(&self, task: &TaskDescriptor) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend;

    #[async_trait]
    impl TransferBackend for StubBackend {
        fn kind(&self) -> SourceKind {
            SourceKind::DirectLink
        }

        async fn resolve_metadata(&self, source: &TaskSource) -> anyhow::Result<SourceMetadata> {
            Ok(SourceMetadata {
                name: source.link.clone(),
                size_bytes: None,
            })
        }

        async fn download(&self, _task: &TaskDescriptor) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn backend_default_methods() -> anyhow::Result<()> {
        let backend = StubBackend;
        let task = TaskDescriptor::new(1, TaskSource::parse("https://example.com/x")?);
        assert!(backend.session_ref(&task).is_none());
        assert!(
            backend
                .await_selection(&task)
                .await
                .expect_err("selection should error")
                .to_string()
                .contains("selection")
        );
        backend.cleanup(&task).await?;
        Ok(())
    }
}
