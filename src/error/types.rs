//! Error types
//!
//! Defines domain-specific error types for each module of the chat server.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Connection module errors
#[derive(Debug)]
pub enum ConnectionError {
    /// The connection was already closed locally.
    Closed(SocketAddr),
    Write(SocketAddr, io::Error),
    /// The peer did not take a line within the write timeout.
    WriteTimeout(SocketAddr, Duration),
    PeerAddr(io::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Closed(addr) => write!(f, "Connection to {} is closed", addr),
            ConnectionError::Write(addr, e) => write!(f, "Failed to write to {}: {}", addr, e),
            ConnectionError::WriteTimeout(addr, after) => {
                write!(f, "Write to {} timed out after {:?}", addr, after)
            }
            ConnectionError::PeerAddr(e) => write!(f, "Failed to resolve peer address: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Listener/acceptor errors
#[derive(Debug)]
pub enum ServerError {
    Bind(String, io::Error),
    Accept(io::Error),
    LocalAddr(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            ServerError::Accept(e) => write!(f, "Failed to accept connection: {}", e),
            ServerError::LocalAddr(e) => write!(f, "Failed to read listener address: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// General chat server error that encompasses all error types
#[derive(Debug)]
pub enum ChatServerError {
    Connection(ConnectionError),
    Server(ServerError),
    Config(config::ConfigError),
    IoError(io::Error),
}

impl fmt::Display for ChatServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatServerError::Connection(e) => write!(f, "Connection error: {}", e),
            ChatServerError::Server(e) => write!(f, "Server error: {}", e),
            ChatServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ChatServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ChatServerError {}

impl From<ConnectionError> for ChatServerError {
    fn from(error: ConnectionError) -> Self {
        ChatServerError::Connection(error)
    }
}

impl From<ServerError> for ChatServerError {
    fn from(error: ServerError) -> Self {
        ChatServerError::Server(error)
    }
}

impl From<config::ConfigError> for ChatServerError {
    fn from(error: config::ConfigError) -> Self {
        ChatServerError::Config(error)
    }
}

impl From<io::Error> for ChatServerError {
    fn from(error: io::Error) -> Self {
        ChatServerError::IoError(error)
    }
}
