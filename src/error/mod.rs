//! Error handling
//!
//! Defines error types and handling for the chat server.

pub mod handlers;
pub mod types;

pub use handlers::{handle_error, is_transient_accept_error};
pub use types::*;
