//! Domain services behind the HTTP handlers.

pub mod identity;
pub mod notifier;
pub mod upload;

pub use identity::{
    migrate_session, IdGenerator, MigrationReport, SessionIdentityManager, Validation,
};
pub use notifier::{CompletionNotifier, LogNotifier};
pub use upload::{IncomingFile, UploadService};

use intake_core::AppError;
use std::future::Future;
use std::time::Duration;

/// Bound a store or storage call. An elapsed deadline becomes `AppError::Timeout`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Operation timed out"
            );
            Err(AppError::Timeout(operation.to_string()))
        }
    }
}
