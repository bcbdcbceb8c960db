//! Identity store trait and its implementations.

mod memory;
mod session;
mod store;

pub use memory::MemoryIdentityStore;
pub use session::SessionRepository;
pub use store::{Completion, IdentityStore, Reservation};
