use async_trait::async_trait;
use intake_core::models::SessionStatus;
use intake_core::{AppError, SessionId};

/// Result of an atomic reserve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The row was inserted by this call.
    Reserved,
    /// A row with this id already existed; nothing was written.
    Duplicate,
}

/// Result of a `reserved -> complete` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    AlreadyComplete,
    /// No row exists for the id.
    Unknown,
}

/// Persistence for session identities.
///
/// `reserve` must be a single atomic insert that reports duplicates instead of
/// overwriting; it is the only mutual exclusion the service relies on.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn exists(&self, id: SessionId) -> Result<bool, AppError> {
        Ok(self.status(id).await?.is_some())
    }

    async fn status(&self, id: SessionId) -> Result<Option<SessionStatus>, AppError>;

    async fn reserve(&self, id: SessionId) -> Result<Reservation, AppError>;

    async fn complete(&self, id: SessionId) -> Result<Completion, AppError>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
