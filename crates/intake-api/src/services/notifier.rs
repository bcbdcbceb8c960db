use async_trait::async_trait;
use intake_core::SessionId;

/// Receives the `reserved -> complete` hand-off once the external verification
/// service has confirmed a session.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn session_completed(&self, session_id: SessionId) -> anyhow::Result<()>;
}

/// Default notifier: records the hand-off in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn session_completed(&self, session_id: SessionId) -> anyhow::Result<()> {
        tracing::info!(session_id = %session_id, "Session completed");
        Ok(())
    }
}
