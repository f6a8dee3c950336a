//! Error handlers
//!
//! Provides error reporting and accept-error classification.

use crate::error::types::ChatServerError;
use log::error;
use std::io;

/// Handle a chat server error
pub fn handle_error(err: &ChatServerError) {
    error!("Chat Server Error: {}", err);
}

/// Returns true when an accept failure only affects the pending connection
/// and the listener can keep accepting.
///
/// `InvalidInput`, `NotConnected` and `Unsupported` mean the listening socket
/// itself is unusable, so the acceptor has to stop.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported
    )
}
