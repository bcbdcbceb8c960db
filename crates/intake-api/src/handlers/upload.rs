use crate::error::{HttpAppError, ValidatedJson};
use crate::services::IncomingFile;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use intake_core::models::{
    DeleteFileRequest, DeleteFileResponse, ErrorResponse, UploadResponse,
};
use intake_core::{AppError, FileRejection};
use std::sync::Arc;
use validator::Validate;

const FILE_FIELD: &str = "file";
const SESSION_FIELD: &str = "sessionId";

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidInput(format!("Failed to read multipart body: {}", e.body_text()))
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    request_body(content = inline(Object), content_type = "multipart/form-data",
        description = "One to three `file` parts and a `sessionId` field"),
    responses(
        (status = 200, description = "Files stored", body = UploadResponse),
        (status = 400, description = "Rejected file or malformed request", body = ErrorResponse),
        (status = 409, description = "Session is not active", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 502, description = "Object store failure", body = ErrorResponse)
    )
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let max_files = state.uploads.policy().max_files;
    let mut session_id: Option<String> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FILE_FIELD) => {
                // Stop reading as soon as the count is exceeded.
                if files.len() == max_files {
                    let rejection = FileRejection::TooManyFiles { limit: max_files };
                    return Err(AppError::from(rejection).into());
                }
                let name = field.file_name().unwrap_or("file.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                files.push(IncomingFile {
                    name,
                    content_type,
                    data,
                });
            }
            Some(SESSION_FIELD) => {
                let text = field.text().await.map_err(multipart_error)?;
                session_id = Some(text.trim().to_string());
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let session_id = session_id
        .ok_or_else(|| AppError::InvalidInput("sessionId is required".to_string()))?;

    let uploaded = state.uploads.upload(&session_id, files).await?;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        files: uploaded,
    }))
}

#[utoipa::path(
    post,
    path = "/delete",
    tag = "upload",
    request_body = DeleteFileRequest,
    responses(
        (status = 200, description = "File removed", body = DeleteFileResponse),
        (status = 400, description = "Missing key or file outside the session", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 502, description = "Object store failure", body = ErrorResponse)
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DeleteFileRequest>,
) -> Result<Json<DeleteFileResponse>, HttpAppError> {
    request.validate()?;
    state.uploads.delete(&request).await?;

    Ok(Json(DeleteFileResponse {
        status: "success".to_string(),
    }))
}
