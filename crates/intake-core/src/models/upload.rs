use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A file accepted by `/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    /// Original file name as sent by the client
    pub name: String,
    pub url: String,
    /// Object key, `uploads/{sessionId}/{sanitized name}`
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub status: String,
    pub files: Vec<UploadedFile>,
}

/// Removal of a previously uploaded file. Either `key` or `url` identifies it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct DeleteFileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 1024, message = "key must be between 1 and 1024 characters"))]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 2048, message = "url must be between 1 and 2048 characters"))]
    pub url: Option<String>,
    #[serde(rename = "sessionId")]
    #[validate(length(max = 64, message = "sessionId must be at most 64 characters"))]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponse {
    pub status: String,
}
