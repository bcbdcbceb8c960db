use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::{admission_key, extract_client_ip};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use intake_core::AppError;
use intake_infra::Admission;
use std::net::SocketAddr;
use std::sync::Arc;

/// Admission control for the session, upload and delete endpoints.
///
/// Every request is counted against `ip:{address}`. Responses carry
/// `X-RateLimit-Limit` and `X-RateLimit-Remaining`; rejected ones are a 429 with
/// `Retry-After` in whole seconds (at least 1).
pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(
        request.headers(),
        socket_addr.as_ref(),
        state.config.trusted_proxy_count(),
    );
    let key = admission_key(ip);
    let limit = state.admission.limit();

    match state.admission.check(&key).await {
        Admission::Admitted { remaining } => {
            let mut response = next.run(request).await;
            set_limit_headers(&mut response, limit, remaining);
            response
        }
        Admission::Rejected { retry_after } => {
            let retry_after_secs = retry_after.as_secs_f64().ceil() as u64;
            tracing::warn!(
                key = %key,
                path = %request.uri().path(),
                limit,
                retry_after_secs,
                "Admission limit exceeded"
            );

            let mut response =
                HttpAppError(AppError::RateLimited { retry_after_secs }).into_response();
            set_limit_headers(&mut response, limit, 0);
            response
        }
    }
}

fn set_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
}
