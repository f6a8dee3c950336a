//! Client management system
//!
//! Handles client connections, the live registry, and the per-client
//! receive loop.

pub mod connection;
pub mod handler;
pub mod registry;

pub use connection::{Connection, ConnectionLimits, LineRead};
pub use handler::{SessionEnd, handle_client};
pub use registry::ClientRegistry;
