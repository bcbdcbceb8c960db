//! Client side of the Intake API.
//!
//! Holds the session identity cache and state, the HTTP client, and the upload
//! orchestrator that drives up to three concurrent transfers for one session.
//! The CLI uses this crate directly.

pub mod api;
pub mod config;
pub mod session;
pub mod upload;

pub use api::{ApiClient, SessionApi};
pub use config::ClientConfig;
pub use session::{
    CachedSession, FileSessionCache, MemorySessionCache, SessionCache, SessionClient,
    SessionEvent, SessionState, SESSION_CACHE_KEY,
};
pub use upload::{
    BatchError, BatchEvent, BatchState, FileSummary, FileUploadTask, HttpTransport,
    SelectedFile, TaskId, TaskState, TransferError, Transport, UploadOrchestrator,
};
