use crate::api::ApiClient;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use intake_core::models::UploadedFile;
use intake_core::{ApiOutcome, SessionId};
use std::path::Path;
use std::sync::Arc;

pub const NETWORK_ERROR_MESSAGE: &str = "network error — retry available";

/// Receives `(sent, total)` byte counts while a body is being sent.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A file picked by the user, held in memory until its transfer finishes.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk. The declared type comes from the extension only;
    /// the content is not sniffed.
    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file.pdf")
            .to_string();

        Ok(Self {
            content_type: content_type_for(path).to_string(),
            name,
            data: Bytes::from(data),
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// Why a transfer or deletion did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out")]
    Timeout,

    /// The server refused the file; the message is shown as is.
    #[error("{0}")]
    Rejected(String),

    #[error("session rejected: {0}")]
    Session(String),

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("server error: {0}")]
    Server(String),
}

impl TransferError {
    /// Inline message shown next to the file.
    pub fn user_message(&self) -> String {
        match self {
            TransferError::Network(_) | TransferError::Timeout => NETWORK_ERROR_MESSAGE.to_string(),
            TransferError::Rejected(message) => message.clone(),
            TransferError::Session(_) => "Your session was reset, please start again".to_string(),
            TransferError::RateLimited { .. } => "Too many requests, try again later".to_string(),
            TransferError::Server(_) => "Something went wrong, try again later".to_string(),
        }
    }
}

impl<T> From<ApiOutcome<T>> for TransferError {
    /// Failure variants only; an `Ok` outcome has nothing to report and maps to a
    /// server error.
    fn from(outcome: ApiOutcome<T>) -> Self {
        match outcome {
            ApiOutcome::Ok(_) => TransferError::Server("unexpected success".to_string()),
            ApiOutcome::ValidationError { message, .. } => TransferError::Rejected(message),
            ApiOutcome::CollisionError { message, .. } => TransferError::Session(message),
            ApiOutcome::RateLimited { retry_after_secs } => {
                TransferError::RateLimited { retry_after_secs }
            }
            ApiOutcome::TransportError { message } => TransferError::Network(message),
            ApiOutcome::ServerError { status, message } => {
                TransferError::Server(format!("{}: {}", status, message))
            }
        }
    }
}

/// Moves bytes for the upload orchestrator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(
        &self,
        session: SessionId,
        file: &SelectedFile,
        progress: ProgressFn,
    ) -> Result<UploadedFile, TransferError>;

    async fn delete(&self, session: SessionId, remote_key: &str) -> Result<(), TransferError>;
}

/// [`Transport`] over the `/upload` and `/delete` endpoints, one request per file.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    api: ApiClient,
}

impl HttpTransport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn transfer(
        &self,
        session: SessionId,
        file: &SelectedFile,
        progress: ProgressFn,
    ) -> Result<UploadedFile, TransferError> {
        match self.api.upload(session, file, Some(progress)).await {
            ApiOutcome::Ok(response) => response
                .files
                .into_iter()
                .next()
                .ok_or_else(|| TransferError::Server("upload response listed no file".to_string())),
            failure => Err(failure.into()),
        }
    }

    async fn delete(&self, session: SessionId, remote_key: &str) -> Result<(), TransferError> {
        match self.api.delete_file(session, remote_key).await {
            ApiOutcome::Ok(()) => Ok(()),
            failure => Err(failure.into()),
        }
    }
}
