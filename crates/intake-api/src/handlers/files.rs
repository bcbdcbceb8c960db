use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use intake_core::AppError;
use intake_storage::keys::UPLOADS_ROOT;
use std::sync::Arc;

/// Serve a stored object for the local storage backend, whose URLs point back at
/// this server. Only keys under the uploads root are reachable.
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !key.starts_with(&format!("{}/", UPLOADS_ROOT)) {
        return Err(AppError::NotFound(key).into());
    }

    let data = state.storage.download(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CACHE_CONTROL, "private, no-store"),
        ],
        data,
    ))
}
