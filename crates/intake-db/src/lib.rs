//! Intake persistence layer
//!
//! The identity store is the only relational state the service owns: one row per
//! session id, guarded by the primary key.

pub mod db;

pub use db::{
    Completion, IdentityStore, MemoryIdentityStore, Reservation, SessionRepository,
};
