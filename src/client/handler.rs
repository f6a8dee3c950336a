use log::{debug, info};
use std::sync::Arc;
use tokio::sync::watch;

use crate::broadcast::broadcast;
use crate::client::{ClientRegistry, Connection, LineRead};
use crate::protocol::{ClientLine, Message, parse_line};

/// Why a client session ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionEnd {
    /// Client sent `quit`
    Quit,
    /// Peer closed, the read failed, or the connection was closed locally
    Disconnected,
    /// Server shutdown was observed between lines
    Shutdown,
}

/// Runs one client's receive loop until quit, disconnect or shutdown.
///
/// - Reads lines with `Connection::read_line`.
/// - Relays every non-`quit` line through `broadcast`.
/// - Always closes the connection on the way out, and unregisters it unless
///   a newer connection has taken over its address.
pub async fn handle_client(
    connection: Arc<Connection>,
    registry: Arc<ClientRegistry>,
    shutdown: watch::Receiver<bool>,
) -> SessionEnd {
    let client_addr = connection.addr();

    let end = loop {
        if *shutdown.borrow() {
            break SessionEnd::Shutdown;
        }

        match connection.read_line().await {
            LineRead::EndOfStream => break SessionEnd::Disconnected,
            LineRead::Line(line) => {
                debug!("Received from {}: {:?}", client_addr, line);

                match parse_line(&line) {
                    ClientLine::Quit => break SessionEnd::Quit,
                    ClientLine::Text(text) => {
                        let message = Message::new(client_addr, text);
                        broadcast(&registry, &message).await;
                    }
                }
            }
        }
    };

    match end {
        SessionEnd::Quit => info!("Client {} requested to quit", client_addr),
        SessionEnd::Disconnected => info!("Connection closed by client {}", client_addr),
        SessionEnd::Shutdown => info!("Releasing client {} for shutdown", client_addr),
    }

    if !registry.unregister_if(&client_addr, &connection).await {
        debug!("Client {} was already replaced or removed", client_addr);
    }
    connection.close().await;
    let remaining = registry.len().await;
    info!(
        "Client {} disconnected ({} clients remaining)",
        client_addr, remaining
    );

    end
}
