//! Tagged result of a network operation as seen by the client.
//!
//! Every client call resolves to exactly one variant, so callers branch on the kind
//! of failure instead of inspecting status codes or error strings.

use crate::session_id::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    Ok(T),
    /// 400: the request itself is wrong. Never retried automatically.
    ValidationError { code: Option<String>, message: String },
    /// 409: the presented session id was rejected. `replacement` is set when the
    /// server minted one.
    CollisionError {
        replacement: Option<SessionId>,
        message: String,
    },
    /// 429
    RateLimited { retry_after_secs: Option<u64> },
    /// Connection failure, timeout, or an unreadable response.
    TransportError { message: String },
    /// 5xx
    ServerError { status: u16, message: String },
}

impl<T> ApiOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiOutcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ApiOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        self.and_then(|value| ApiOutcome::Ok(f(value)))
    }

    /// Chain a step that can itself fail; failures pass through unchanged.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ApiOutcome<U>) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Ok(value) => f(value),
            ApiOutcome::ValidationError { code, message } => {
                ApiOutcome::ValidationError { code, message }
            }
            ApiOutcome::CollisionError {
                replacement,
                message,
            } => ApiOutcome::CollisionError {
                replacement,
                message,
            },
            ApiOutcome::RateLimited { retry_after_secs } => {
                ApiOutcome::RateLimited { retry_after_secs }
            }
            ApiOutcome::TransportError { message } => ApiOutcome::TransportError { message },
            ApiOutcome::ServerError { status, message } => {
                ApiOutcome::ServerError { status, message }
            }
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiOutcome::Ok(_) => "ok",
            ApiOutcome::ValidationError { .. } => "validation_error",
            ApiOutcome::CollisionError { .. } => "collision_error",
            ApiOutcome::RateLimited { .. } => "rate_limited",
            ApiOutcome::TransportError { .. } => "transport_error",
            ApiOutcome::ServerError { .. } => "server_error",
        }
    }

    /// Message safe to show to the visitor. Server and transport details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiOutcome::Ok(_) => String::new(),
            ApiOutcome::ValidationError { message, .. } => message.clone(),
            ApiOutcome::CollisionError { .. } => {
                "Your session was reset, please start again".to_string()
            }
            ApiOutcome::RateLimited { .. } => "Too many requests, try again later".to_string(),
            ApiOutcome::TransportError { .. } | ApiOutcome::ServerError { .. } => {
                "Something went wrong, try again later".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_failure_variants() {
        let outcome: ApiOutcome<u32> = ApiOutcome::RateLimited {
            retry_after_secs: Some(5),
        };
        let mapped = outcome.map(|v| v.to_string());
        assert_eq!(
            mapped,
            ApiOutcome::RateLimited {
                retry_after_secs: Some(5)
            }
        );

        let ok: ApiOutcome<u32> = ApiOutcome::Ok(2);
        assert_eq!(ok.map(|v| v * 2).ok(), Some(4));
    }

    #[test]
    fn server_details_are_not_shown_to_users() {
        let outcome: ApiOutcome<()> = ApiOutcome::ServerError {
            status: 500,
            message: "pool timed out".to_string(),
        };
        assert!(!outcome.user_message().contains("pool"));
        assert_eq!(outcome.kind(), "server_error");
    }
}
