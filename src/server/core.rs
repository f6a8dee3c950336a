use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::client::{ClientRegistry, Connection, ConnectionLimits, handle_client};
use crate::config::ServerConfig;
use crate::error::{ServerError, is_transient_accept_error};
use crate::utils::flag_raised;

/// Pause after a transient accept failure so resource exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A bound chat listener that has not started accepting yet.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    limits: ConnectionLimits,
    handle: ServerHandle,
}

/// Cloneable control surface of a running server: the client registry and
/// the shutdown flag.
#[derive(Clone)]
pub struct ServerHandle {
    registry: Arc<ClientRegistry>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    /// Binds the listener described by `config`.
    ///
    /// A bind failure is fatal: the server never starts.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let socket = config.socket_addr();

        let listener = TcpListener::bind(&socket)
            .await
            .map_err(|e| ServerError::Bind(socket.clone(), e))?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        info!("Server bound to {}", local_addr);

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            limits: config.connection_limits(),
            handle: ServerHandle {
                registry: Arc::new(ClientRegistry::new()),
                shutdown: Arc::new(shutdown),
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Runs the accept loop until shutdown is signalled or the listener fails.
    ///
    /// Each accepted stream is registered and handed to its own receiver
    /// task before the loop goes back to accepting. On the way out the
    /// listening socket is dropped and every remaining client is closed.
    pub async fn start(self) {
        let Server {
            listener,
            local_addr,
            limits,
            handle,
        } = self;
        let mut shutdown = handle.shutdown.subscribe();

        info!("Starting RAX chat server on {}", local_addr);

        loop {
            tokio::select! {
                _ = flag_raised(&mut shutdown) => {
                    info!("Server shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => accept_client(stream, limits, &handle).await,
                    Err(e) if is_transient_accept_error(&e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    Err(e) => {
                        error!("{}; listener on {} is unusable", ServerError::Accept(e), local_addr);
                        break;
                    }
                }
            }
        }

        drop(listener);
        handle.stop().await;
        info!("Chat server on {} stopped", local_addr);
    }
}

impl ServerHandle {
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signals shutdown and closes every registered client. Idempotent.
    ///
    /// The acceptor exits on its next wakeup and drops the listening socket.
    pub async fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Stopping chat server");
        }

        let closed = self.registry.close_all().await;
        if closed > 0 {
            info!("Closed {} client connection(s)", closed);
        }
    }
}

/// Registers a freshly accepted stream and spawns its receiver.
async fn accept_client(stream: TcpStream, limits: ConnectionLimits, handle: &ServerHandle) {
    let connection = match Connection::from_stream(stream, limits) {
        Ok(connection) => Arc::new(connection),
        Err(e) => {
            warn!("Dropping accepted stream: {}", e);
            return;
        }
    };
    let addr = connection.addr();
    let registry = Arc::clone(&handle.registry);

    if let Some(stale) = registry.register(addr, Arc::clone(&connection)).await {
        stale.close().await;
    }
    let total = registry.len().await;
    info!("Accepted client {} ({} clients)", addr, total);

    let shutdown = handle.shutdown.subscribe();

    // Spawn a task for each client so accept loop doesn't block
    tokio::spawn(async move {
        let end = handle_client(connection, registry, shutdown).await;
        debug!("Receiver for {} finished: {:?}", addr, end);
    });
}
