use crate::error::{HttpAppError, ValidatedJson};
use crate::services::Validation;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use intake_core::models::{
    CompleteSessionRequest, ErrorResponse, ResponseStatus, SessionResponse, ValidateUuidRequest,
    ValidateUuidResponse,
};
use intake_core::AppError;
use intake_db::Completion;
use std::sync::Arc;
use validator::Validate;

const MAX_ECHO_LEN: usize = 64;

#[utoipa::path(
    post,
    path = "/session/generate-uuid",
    tag = "session",
    responses(
        (status = 200, description = "New session id reserved", body = SessionResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Could not reserve a unique id", body = ErrorResponse)
    )
)]
pub async fn generate_uuid(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionResponse>, HttpAppError> {
    let id = state.identity.mint().await?;

    Ok(Json(SessionResponse {
        status: ResponseStatus::Success,
        uuid: id.to_string(),
        message: "Session created".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/session/validate-uuid",
    tag = "session",
    request_body = ValidateUuidRequest,
    responses(
        (status = 200, description = "Session id accepted", body = ValidateUuidResponse),
        (status = 400, description = "Malformed session id", body = ValidateUuidResponse),
        (status = 409, description = "Session id taken, replacement issued", body = ValidateUuidResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Identity store unavailable", body = ErrorResponse)
    )
)]
pub async fn validate_uuid(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ValidateUuidRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let verdict = if request.validate().is_err() {
        Validation::Malformed
    } else {
        state.identity.validate(&request.uuid, request.fresh).await?
    };

    let (status, body) = match verdict {
        Validation::Valid(id) => (
            StatusCode::OK,
            ValidateUuidResponse {
                status: ResponseStatus::Success,
                uuid: id.to_string(),
                previous_uuid: None,
                message: "Session id is valid".to_string(),
            },
        ),
        Validation::Malformed => (
            StatusCode::BAD_REQUEST,
            ValidateUuidResponse {
                status: ResponseStatus::Invalid,
                uuid: request.uuid.chars().take(MAX_ECHO_LEN).collect(),
                previous_uuid: None,
                message: "Your session could not be verified. A new session will be started."
                    .to_string(),
            },
        ),
        Validation::Collision {
            previous,
            replacement,
        } => (
            StatusCode::CONFLICT,
            ValidateUuidResponse {
                status: ResponseStatus::Collision,
                uuid: replacement.to_string(),
                previous_uuid: Some(previous.to_string()),
                message: "Your session id was already in use. A new one has been issued."
                    .to_string(),
            },
        ),
    };

    Ok((status, Json(body)))
}

#[utoipa::path(
    post,
    path = "/session/complete",
    tag = "session",
    request_body = CompleteSessionRequest,
    responses(
        (status = 200, description = "Session marked complete", body = SessionResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    )
)]
pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompleteSessionRequest>,
) -> Result<Json<SessionResponse>, HttpAppError> {
    request.validate()?;

    let (id, completion) = state.identity.complete(&request.uuid).await?;
    let message = match completion {
        Completion::Completed => "Session completed",
        Completion::AlreadyComplete => "Session was already complete",
        Completion::Unknown => {
            return Err(AppError::NotFound(format!("Session {} not found", id)).into())
        }
    };

    Ok(Json(SessionResponse {
        status: ResponseStatus::Success,
        uuid: id.to_string(),
        message: message.to_string(),
    }))
}
