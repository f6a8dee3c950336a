//! Module `message`
//!
//! The chat message relayed to every client and its wire rendering:
//! `ack<sender> <YYYY/MM/DD-HH:MM:SS> <text>`.

use chrono::{DateTime, Local};
use std::fmt;
use std::net::SocketAddr;

/// strftime pattern of the broadcast timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// Prefix of every server-to-client line
const ACK_PREFIX: &str = "ack";

/// One received chat line, stamped with its sender and arrival time.
#[derive(Debug, Clone)]
pub struct Message {
    sender: SocketAddr,
    timestamp: DateTime<Local>,
    text: String,
}

impl Message {
    /// Builds a message stamped with the current local time.
    pub fn new(sender: SocketAddr, text: impl Into<String>) -> Self {
        Self::with_timestamp(sender, Local::now(), text)
    }

    pub fn with_timestamp(
        sender: SocketAddr,
        timestamp: DateTime<Local>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            timestamp,
            text: text.into(),
        }
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Renders the broadcast line, without the trailing newline.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {} {}",
            ACK_PREFIX,
            format_peer_addr(&self.sender),
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.text
        )
    }
}

/// Renders a peer address in tuple form, e.g. `('127.0.0.1', 54321)`.
pub fn format_peer_addr(addr: &SocketAddr) -> String {
    format!("('{}', {})", addr.ip(), addr.port())
}
