//! Configuration management for RAX Chat Server
//!
//! Built-in defaults are layered under an optional `config.toml` and
//! `RAX_CHAT_*` environment overrides. Everything here is read once at
//! startup; changing a value requires a restart.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::client::ConnectionLimits;
use crate::client::connection::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_WRITE_TIMEOUT};

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "RAX_CHAT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9999;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 3;

/// Startup configuration for the chat server
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// IP address or host name the chat listener binds to
    /// Environment: RAX_CHAT_BIND_ADDRESS
    pub bind_address: String,

    /// TCP port of the chat listener (0 picks an ephemeral port)
    /// Environment: RAX_CHAT_PORT
    pub port: u16,

    /// How long `exit` waits for the acceptor to wind down
    /// Environment: RAX_CHAT_SHUTDOWN_GRACE_SECS
    pub shutdown_grace_secs: u64,

    /// Seconds a client may take to accept one relayed line before it is dropped
    /// Environment: RAX_CHAT_WRITE_TIMEOUT_SECS
    pub write_timeout_secs: u64,

    /// Longest line a client may send, in bytes, terminator excluded
    /// Environment: RAX_CHAT_MAX_LINE_LENGTH
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT.as_secs(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (or `$RAX_CHAT_CONFIG`) with
    /// environment overrides. A missing file is not an error.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from the given file path (extension optional)
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("shutdown_grace_secs", DEFAULT_SHUTDOWN_GRACE_SECS as i64)?
            .set_default("write_timeout_secs", DEFAULT_WRITE_TIMEOUT.as_secs() as i64)?
            .set_default("max_line_length", DEFAULT_MAX_LINE_LENGTH as i64)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("RAX_CHAT").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.write_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "write_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.max_line_length == 0 {
            return Err(config::ConfigError::Message(
                "max_line_length must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Bounds applied to every accepted connection
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_line_length: self.max_line_length,
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }
}
