//! HTTP client for the Intake API.
//!
//! Every call resolves to an [`ApiOutcome`]; status codes and error bodies are
//! interpreted here and nowhere else.

use crate::config::ClientConfig;
use crate::upload::{ProgressFn, SelectedFile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use intake_core::models::{
    DeleteFileRequest, DeleteFileResponse, SessionResponse, UploadResponse, ValidateUuidResponse,
};
use intake_core::{parse_session_id, ApiOutcome, SessionId};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Upload bodies are fed to the connection in chunks of this size so progress can be
/// reported while bytes leave the process.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Session endpoints as seen by [`crate::SessionClient`].
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn generate_uuid(&self) -> ApiOutcome<SessionId>;

    /// `Ok` carries the id the server accepted (always the presented one).
    async fn validate_uuid(&self, uuid: &str, fresh: bool) -> ApiOutcome<SessionId>;
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn generate_uuid(&self) -> ApiOutcome<SessionId> {
        let request = self.client.post(self.build_url("/session/generate-uuid"));
        self.send::<SessionResponse>(request, "generate_uuid")
            .await
            .and_then(|response| issued_id(&response.uuid))
    }

    pub async fn validate_uuid(&self, uuid: &str, fresh: bool) -> ApiOutcome<SessionId> {
        let request = self
            .client
            .post(self.build_url("/session/validate-uuid"))
            .json(&serde_json::json!({ "uuid": uuid, "fresh": fresh }));
        self.send::<ValidateUuidResponse>(request, "validate_uuid")
            .await
            .and_then(|response| issued_id(&response.uuid))
    }

    pub async fn complete_session(&self, session: SessionId) -> ApiOutcome<SessionResponse> {
        let request = self
            .client
            .post(self.build_url("/session/complete"))
            .json(&serde_json::json!({ "uuid": session.to_string() }));
        self.send(request, "complete_session").await
    }

    /// Send one file to `/upload`. `progress` receives `(sent, total)` byte counts as
    /// the body is consumed by the connection.
    pub async fn upload(
        &self,
        session: SessionId,
        file: &SelectedFile,
        progress: Option<ProgressFn>,
    ) -> ApiOutcome<UploadResponse> {
        let part = match file_part(file, progress) {
            Ok(part) => part,
            Err(e) => {
                return ApiOutcome::ValidationError {
                    code: None,
                    message: format!("Invalid file: {}", e),
                }
            }
        };

        let form = reqwest::multipart::Form::new()
            .text("sessionId", session.to_string())
            .part("file", part);

        let request = self.client.post(self.build_url("/upload")).multipart(form);
        self.send(request, "upload").await
    }

    pub async fn delete_file(&self, session: SessionId, key: &str) -> ApiOutcome<()> {
        let body = DeleteFileRequest {
            key: Some(key.to_string()),
            url: None,
            session_id: session.to_string(),
        };
        let request = self.client.post(self.build_url("/delete")).json(&body);
        self.send::<DeleteFileResponse>(request, "delete_file")
            .await
            .map(drop)
    }

    async fn send<T: DeserializeOwned + std::fmt::Debug>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> ApiOutcome<T> {
        let outcome = match request.send().await {
            Ok(response) => read_outcome(response).await,
            Err(e) => transport_error(e),
        };

        if !outcome.is_ok() {
            tracing::warn!(
                operation,
                outcome = outcome.kind(),
                detail = ?outcome,
                "API call failed"
            );
        }
        outcome
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn generate_uuid(&self) -> ApiOutcome<SessionId> {
        ApiClient::generate_uuid(self).await
    }

    async fn validate_uuid(&self, uuid: &str, fresh: bool) -> ApiOutcome<SessionId> {
        ApiClient::validate_uuid(self, uuid, fresh).await
    }
}

fn issued_id(uuid: &str) -> ApiOutcome<SessionId> {
    match parse_session_id(uuid) {
        Ok(id) => ApiOutcome::Ok(id),
        Err(e) => ApiOutcome::TransportError {
            message: format!("Server issued an unusable session id: {}", e),
        },
    }
}

fn transport_error<T>(e: reqwest::Error) -> ApiOutcome<T> {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    ApiOutcome::TransportError { message }
}

fn file_part(
    file: &SelectedFile,
    progress: Option<ProgressFn>,
) -> Result<reqwest::multipart::Part, reqwest::Error> {
    let total = file.data.len() as u64;
    let body = match progress {
        Some(progress) => reqwest::Body::wrap_stream(progress_stream(file.data.clone(), progress)),
        None => reqwest::Body::from(file.data.clone()),
    };

    reqwest::multipart::Part::stream_with_length(body, total)
        .file_name(file.name.clone())
        .mime_str(&file.content_type)
}

fn progress_stream(
    data: Bytes,
    progress: ProgressFn,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len() as u64;
    let mut sent = 0u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_BYTES).min(data.len())))
        .collect();

    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok(chunk)
    }))
}

/// Map a response onto the outcome taxonomy.
async fn read_outcome<T: DeserializeOwned>(response: Response) -> ApiOutcome<T> {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => return transport_error(e),
    };

    if status.is_success() {
        return match serde_json::from_slice::<T>(&body) {
            Ok(value) => ApiOutcome::Ok(value),
            Err(e) => ApiOutcome::TransportError {
                message: format!("Unreadable response: {}", e),
            },
        };
    }

    classify_failure(status, retry_after_secs, &body)
}

fn classify_failure<T>(status: StatusCode, retry_after_secs: Option<u64>, body: &[u8]) -> ApiOutcome<T> {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);

    let message = field("error")
        .or_else(|| field("message"))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiOutcome::RateLimited { retry_after_secs },
        StatusCode::CONFLICT => ApiOutcome::CollisionError {
            replacement: field("uuid").and_then(|uuid| parse_session_id(&uuid).ok()),
            message,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ApiOutcome::TransportError { message }
        }
        s if s.is_server_error() => ApiOutcome::ServerError {
            status: s.as_u16(),
            message,
        },
        _ => ApiOutcome::ValidationError {
            code: field("code").or_else(|| field("status")),
            message,
        },
    }
}
