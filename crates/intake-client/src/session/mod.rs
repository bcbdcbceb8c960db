mod cache;
mod client;
mod state;

pub use cache::{CachedSession, FileSessionCache, MemorySessionCache, SessionCache, SESSION_CACHE_KEY};
pub use client::SessionClient;
pub use state::{SessionEvent, SessionState, COLLISION_NOTICE, RESET_NOTICE};
