//! Intake Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, session id
//! format rules and upload policy shared by the server, the client and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod outcome;
pub mod session_id;
pub mod storage_types;
pub mod upload_policy;

// Re-export commonly used types
pub use config::{Config, IdentityStoreBackend, ServerConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use outcome::ApiOutcome;
pub use session_id::{is_canonical_session_id, new_session_id, parse_session_id, SessionId};
pub use storage_types::StorageBackend;
pub use upload_policy::{stored_file_name, FileRejection, UploadPolicy};
