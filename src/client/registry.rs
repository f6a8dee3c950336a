//! Client registry
//!
//! Tracks every connected client, keyed by peer address.

use log::debug;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::Connection;

/// Registry of live connections.
///
/// Every operation holds the lock only for the map access itself; connection
/// I/O always happens on a snapshot, outside the lock.
pub struct ClientRegistry {
    clients: Mutex<HashMap<SocketAddr, Arc<Connection>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a connection, returning the entry it replaced, if any.
    pub async fn register(
        &self,
        addr: SocketAddr,
        connection: Arc<Connection>,
    ) -> Option<Arc<Connection>> {
        self.clients.lock().await.insert(addr, connection)
    }

    /// Removes a connection. Removing an absent address is a no-op.
    pub async fn unregister(&self, addr: &SocketAddr) -> Option<Arc<Connection>> {
        self.clients.lock().await.remove(addr)
    }

    /// Removes `addr` only while it still maps to `connection`.
    ///
    /// A session that was replaced under the same address must not evict
    /// its successor. Returns whether an entry was removed.
    pub async fn unregister_if(&self, addr: &SocketAddr, connection: &Arc<Connection>) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.get(addr) {
            Some(current) if Arc::ptr_eq(current, connection) => {
                clients.remove(addr);
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of all registered connections.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.clients.lock().await.values().cloned().collect()
    }

    /// Empties the registry and closes every connection it held.
    ///
    /// Returns how many connections were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut clients = self.clients.lock().await;
            clients.drain().map(|(_, connection)| connection).collect()
        };

        for connection in &drained {
            debug!("Closing connection to {}", connection.addr());
            connection.close().await;
        }
        drained.len()
    }

    pub async fn addresses(&self) -> Vec<SocketAddr> {
        self.clients.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
