//! Client address resolution for admission control.
//!
//! Forwarding headers are only believed when the deployment declares trusted proxies
//! in front of the server. Without them every header is client-controlled, so the
//! socket peer is the only address that counts.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Resolve the caller's address.
///
/// With `trusted_proxy_count = N > 0` the client is the N-th entry from the end of
/// `X-Forwarded-For`, since each proxy appends the peer it saw. `X-Real-IP` is used
/// when the chain is absent or too short. Falls back to the socket peer.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<IpAddr> {
    if trusted_proxy_count > 0 {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| extract_from_forwarded_for(v, trusted_proxy_count));
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    socket_addr.map(|addr| addr.ip())
}

/// Pick the client entry from an `X-Forwarded-For` chain (`client, proxy1, proxy2`).
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // A chain shorter than the proxy count was not built by the trusted proxies.
    if ips.len() < trusted_proxy_count {
        return None;
    }

    ips.get(ips.len() - trusted_proxy_count)
        .and_then(|ip| ip.parse().ok())
}

/// Admission key for a resolved address.
pub fn admission_key(ip: Option<IpAddr>) -> String {
    match ip {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}
