pub mod files;
pub mod health;
pub mod session;
pub mod upload;
