//! Route configuration and setup.

use crate::handlers::{files, health, session, upload};
use crate::middleware::admission_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use intake_core::{Config, StorageBackend};
use intake_infra::{request_id_middleware, security_headers_middleware, SecurityHeaders};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const HTTP_CONCURRENCY_LIMIT: usize = 1_024;
/// Room for multipart boundaries and the `sessionId` field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let policy = state.uploads.policy();
    let body_limit = policy.max_files * policy.max_file_size_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let security_headers = SecurityHeaders {
        hsts: config.is_production(),
    };

    tracing::info!(
        admission_limit = config.admission_limit(),
        admission_window_secs = config.admission_window_secs(),
        request_timeout_secs = config.request_timeout_secs(),
        body_limit,
        "Routes configured"
    );

    let app = public_routes(config)
        .merge(admitted_routes(state.clone()))
        .nest(
            "/docs",
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
                .path("/docs")
                .into(),
        )
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs(),
        )))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {:?}: {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn public_routes(config: &Config) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        );

    // Local storage URLs point back at this server.
    if config.storage_backend() == StorageBackend::Local {
        router.route("/files/{*key}", get(files::serve_file))
    } else {
        router
    }
}

/// Endpoints behind admission control.
fn admitted_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/session/generate-uuid", post(session::generate_uuid))
        .route("/session/validate-uuid", post(session::validate_uuid))
        .route("/session/complete", post(session::complete_session))
        .route("/upload", post(upload::upload_files))
        .route("/delete", post(upload::delete_file))
        .layer(axum::middleware::from_fn_with_state(
            state,
            admission_middleware,
        ))
}
