//! Chat protocol
//!
//! Handles client line classification and the broadcast message format.

pub mod commands;
pub mod message;

pub use commands::{ClientLine, QUIT_TOKEN, parse_line};
pub use message::{Message, TIMESTAMP_FORMAT, format_peer_addr};
