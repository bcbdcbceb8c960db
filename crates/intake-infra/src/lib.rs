//! Intake Infrastructure Library
//!
//! Shared infrastructure used by the intake server:
//! - Admission control (per-address rolling request budget)
//! - Middleware (request ID, security headers)
//! - Telemetry initialization

#[cfg(feature = "admission")]
pub mod admission;

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "admission")]
pub use admission::{Admission, AdmissionControl};

#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
    SecurityHeaders,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};
