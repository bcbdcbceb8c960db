//! Data models shared by the server and the client.

mod error_response;
mod session;
mod upload;

pub use error_response::*;
pub use session::*;
pub use upload::*;
