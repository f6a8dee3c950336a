//! Server core functionality
//!
//! This module contains the listener/acceptor, its shutdown handle, and the
//! operator console.

pub mod console;
pub mod core;

pub use console::{ConsoleOutcome, run_console};
pub use self::core::{Server, ServerHandle};
