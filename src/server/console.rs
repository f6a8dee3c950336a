//! Operator console
//!
//! Reads operator commands from a line source. `exit` stops the server;
//! any other input logs the connected clients.

use log::info;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::server::ServerHandle;

pub const PROMPT: &str = ">>>";
pub const EXIT_COMMAND: &str = "exit";

/// How the console loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// Operator typed `exit`; the server has been stopped
    Exit,
    /// Input reached end of stream; the server is still running
    InputClosed,
}

/// Prompts on `output` and executes commands read from `input`.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    handle: &ServerHandle,
) -> io::Result<ConsoleOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(ConsoleOutcome::InputClosed);
        };

        match line.trim() {
            EXIT_COMMAND => {
                handle.stop().await;
                return Ok(ConsoleOutcome::Exit);
            }
            "" => continue,
            _ => {
                let clients = handle.registry().addresses().await;
                info!("{} client(s) connected: {:?}", clients.len(), clients);
            }
        }
    }
}
