//! Module `commands`
//!
//! Classifies the lines a chat client sends. The protocol has one command,
//! `quit`; every other line is chat text to relay.

/// Line a client sends to leave the chat
pub const QUIT_TOKEN: &str = "quit";

/// A line received from a client.
#[derive(Debug, PartialEq)]
pub enum ClientLine {
    /// Client-initiated close
    Quit,
    /// Text to broadcast, exactly as received minus the line terminator
    Text(String),
}

/// Parses a line (already stripped of its terminator) into a `ClientLine`.
///
/// Only surrounding whitespace is ignored when matching `quit`; the token is
/// case-sensitive. Text lines are kept verbatim.
pub fn parse_line(raw: &str) -> ClientLine {
    if raw.trim() == QUIT_TOKEN {
        ClientLine::Quit
    } else {
        ClientLine::Text(raw.to_string())
    }
}
