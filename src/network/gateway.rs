//! Broadcast Gateway
//!
//! Delivers server messages to connections. Each connection registers an
//! outbound channel; the socket task drains it. Sends never block the
//! coordinator: a full or closed channel drops the message.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::game::state::ConnectionId;
use crate::network::protocol::ServerMessage;

/// Outbound channels keyed by connection.
#[derive(Debug, Default)]
pub struct Gateway {
    clients: BTreeMap<ConnectionId, mpsc::Sender<ServerMessage>>,
}

impl Gateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound channel.
    pub fn register(&mut self, id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        self.clients.insert(id, sender);
    }

    /// Drop a connection's outbound channel.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Whether a connection is registered.
    pub fn is_connected(&self, id: &ConnectionId) -> bool {
        self.clients.contains_key(id)
    }

    /// Connected client count.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Send a message to one connection.
    pub fn send(&self, to: &ConnectionId, message: ServerMessage) -> bool {
        let Some(sender) = self.clients.get(to) else {
            debug!("Dropping message for unknown connection {}", to.short());
            return false;
        };
        match sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound queue full for {}, message dropped", to.short());
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbound queue closed for {}", to.short());
                false
            }
        }
    }

    /// Send the same message to every listed connection.
    pub fn broadcast(&self, to: &[ConnectionId], message: &ServerMessage) {
        for id in to {
            self.send(id, message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_registered() {
        let mut gateway = Gateway::new();
        let id = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(4);
        gateway.register(id, tx);

        assert!(gateway.send(&id, ServerMessage::Waiting));
        assert_eq!(rx.recv().await, Some(ServerMessage::Waiting));
    }

    #[tokio::test]
    async fn test_send_to_unknown() {
        let gateway = Gateway::new();
        assert!(!gateway.send(&ConnectionId::new(), ServerMessage::Waiting));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let mut gateway = Gateway::new();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);
        gateway.register(id, tx);

        assert!(gateway.send(&id, ServerMessage::Waiting));
        assert!(!gateway.send(&id, ServerMessage::Waiting));
    }

    #[tokio::test]
    async fn test_broadcast() {
        let mut gateway = Gateway::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        gateway.register(a, tx_a);
        gateway.register(b, tx_b);

        gateway.broadcast(&[a, b], &ServerMessage::OpponentDisconnected);
        assert_eq!(rx_a.recv().await, Some(ServerMessage::OpponentDisconnected));
        assert_eq!(rx_b.recv().await, Some(ServerMessage::OpponentDisconnected));

        assert!(gateway.unregister(&a));
        assert!(!gateway.is_connected(&a));
        assert_eq!(gateway.len(), 1);
    }
}
