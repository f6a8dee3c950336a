pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
mod utils;

pub use crate::config::ServerConfig;
pub use server::{Server, ServerHandle};
