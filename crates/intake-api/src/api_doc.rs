//! OpenAPI documentation, served at `/api/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::OpenApi;

use crate::handlers;
use intake_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Intake API",
        version = "0.1.0",
        description = "Session identities and document uploads for the onboarding assistant. Session, upload and delete endpoints share a per-address request budget and answer 429 when it is exhausted."
    ),
    paths(
        handlers::session::generate_uuid,
        handlers::session::validate_uuid,
        handlers::session::complete_session,
        handlers::upload::upload_files,
        handlers::upload::delete_file,
        handlers::health::health_check,
        handlers::health::liveness_check,
    ),
    components(schemas(
        models::SessionStatus,
        models::ResponseStatus,
        models::SessionResponse,
        models::ValidateUuidRequest,
        models::ValidateUuidResponse,
        models::CompleteSessionRequest,
        models::UploadedFile,
        models::UploadResponse,
        models::DeleteFileRequest,
        models::DeleteFileResponse,
        models::ErrorResponse,
        handlers::health::HealthCheckResponse,
    )),
    tags(
        (name = "session", description = "Session identity lifecycle"),
        (name = "upload", description = "Document upload and removal"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
