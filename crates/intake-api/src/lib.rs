//! Intake API Library
//!
//! HTTP surface of the onboarding assistant: session identity endpoints, document
//! upload and removal, health probes and the OpenAPI document.

mod api_doc;
mod handlers;

pub mod error;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod utils;

pub use error::HttpAppError;
pub use state::AppState;
