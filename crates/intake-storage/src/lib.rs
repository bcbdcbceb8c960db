//! Intake Storage Library
//!
//! Object storage for uploaded onboarding documents, with S3 (via `object_store`)
//! and local filesystem backends behind one `Storage` trait.
//!
//! # Storage key format
//!
//! Every object lives under its session namespace: `uploads/{sessionId}/{fileName}`.
//! Keys must not contain `..` or a leading `/`. Key construction is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use intake_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
