// Public API for integration tests and potential library usage

pub mod api;
pub mod channel;
pub mod config;
pub mod identity;
pub mod protocol;
pub mod state;
pub mod types;
pub mod ws;
