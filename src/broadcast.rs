//! Message fan-out
//!
//! Delivers one rendered message to every client in a registry snapshot,
//! the sender included.

use log::{debug, warn};

use crate::client::ClientRegistry;
use crate::protocol::Message;

/// Delivery counts of one broadcast pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Writes `message` to every currently registered connection.
///
/// Best-effort: a failed write is logged and delivery continues with the
/// remaining recipients. Nothing is retried.
pub async fn broadcast(registry: &ClientRegistry, message: &Message) -> BroadcastReport {
    let line = message.to_string();
    let recipients = registry.snapshot().await;
    let mut report = BroadcastReport::default();

    for connection in recipients {
        match connection.write_line(&line).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    "Failed to deliver message from {}: {}",
                    message.sender(),
                    e
                );
                report.failed += 1;
            }
        }
    }

    debug!(
        "Broadcast from {} delivered to {} client(s), {} failed",
        message.sender(),
        report.delivered,
        report.failed
    );
    report
}
