//! WebSocket Game Server
//!
//! Accepts WebSocket connections, assigns each a connection id and relays
//! frames between the socket and the coordinator. The server holds no game
//! state of its own.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::round::env_or;
use crate::game::state::ConnectionId;
use crate::network::coordinator::CoordinatorHandle;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};

/// Outbound messages buffered per connection before drops.
const OUTBOUND_QUEUE: usize = 64;

/// How long a closing connection may take to flush its queue.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("TRIVIA_BIND_ADDR", defaults.bind_addr),
            max_connections: env_or("TRIVIA_MAX_CONNECTIONS", defaults.max_connections),
            version: defaults.version,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Where client frames go.
    coordinator: CoordinatorHandle,
    /// Open connections.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server feeding `coordinator`.
    pub fn new(config: ServerConfig, coordinator: CoordinatorHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            coordinator,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let coordinator = self.coordinator.clone();
        let connections = self.connections.clone();
        let version = self.config.version.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let conn = ConnectionId::new();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

            // Spawn message sender task
            let mut sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let _ = msg_tx
                .send(ServerMessage::Welcome { connection_id: conn, server_version: version })
                .await;
            if coordinator.connected(conn, msg_tx.clone()).await {
                debug!("Client {} is connection {}", addr, conn.short());

                // Handle incoming messages
                loop {
                    tokio::select! {
                        msg = ws_receiver.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    match ClientMessage::from_json(&text) {
                                        Ok(client_msg) => {
                                            if !coordinator.message(conn, client_msg).await {
                                                break;
                                            }
                                        }
                                        Err(e) => {
                                            debug!("Invalid message from {}: {}", addr, e);
                                            let _ = msg_tx.try_send(ServerMessage::error(
                                                ErrorCode::InvalidMessage,
                                                "Invalid message format",
                                            ));
                                        }
                                    }
                                }
                                Some(Ok(Message::Binary(_))) => {
                                    let _ = msg_tx.try_send(ServerMessage::error(
                                        ErrorCode::InvalidMessage,
                                        "Binary frames are not supported",
                                    ));
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    debug!("Client {} disconnected", addr);
                                    break;
                                }
                                Some(Err(e)) => {
                                    warn!("WebSocket error for {}: {}", addr, e);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            let _ = msg_tx.try_send(ServerMessage::Shutdown {
                                reason: "Server shutting down".to_string(),
                            });
                            break;
                        }
                    }
                }
            }

            // Cleanup
            coordinator.disconnected(conn).await;
            drop(msg_tx);
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
                sender_task.abort();
            }

            connections.fetch_sub(1, Ordering::Relaxed);
            info!("Connection {} from {} closed", conn.short(), addr);
        });
    }

    /// Tell an over-limit client why it is being turned away, then close.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for rejected {}: {}", addr, e);
                    return;
                }
            };
            match ServerMessage::error(ErrorCode::ServerOverloaded, "Server is full").to_json() {
                Ok(text) => {
                    let _ = ws_stream.send(Message::Text(text)).await;
                }
                Err(e) => error!("Failed to serialize message: {}", e),
            }
            let _ = ws_stream.close(None).await;
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get open connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::region::RegionGraph;
    use crate::game::round::MatchConfig;
    use crate::network::coordinator::Coordinator;
    use crate::question::QuestionPool;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start() -> (Arc<GameServer>, SocketAddr) {
        start_with(ServerConfig::default()).await
    }

    async fn start_with(config: ServerConfig) -> (Arc<GameServer>, SocketAddr) {
        let (coordinator, handle) = Coordinator::new(
            MatchConfig::default(),
            Arc::new(RegionGraph::standard()),
            Arc::new(QuestionPool::builtin()),
        );
        tokio::spawn(coordinator.run());

        let server = Arc::new(GameServer::new(config, handle));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });
        (server, addr)
    }

    async fn recv(socket: &mut Socket) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("timed out")
                .expect("socket closed")
                .expect("socket error");
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    async fn send(socket: &mut Socket, msg: ClientMessage) {
        socket.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_welcome_and_invalid_frame() {
        let (_server, addr) = start().await;
        let (mut socket, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        assert!(matches!(recv(&mut socket).await, ServerMessage::Welcome { .. }));

        socket.send(Message::Text("{\"type\":\"teleport\"}".into())).await.unwrap();
        let ServerMessage::Error(err) = recv(&mut socket).await else {
            panic!("expected error");
        };
        assert_eq!(err.code, ErrorCode::InvalidMessage);

        send(&mut socket, ClientMessage::Ping { timestamp: 7 }).await;
        assert!(matches!(recv(&mut socket).await, ServerMessage::Pong { timestamp: 7, .. }));
    }

    #[tokio::test]
    async fn test_two_clients_are_matched() {
        let (_server, addr) = start().await;
        let (mut x, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut y, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        recv(&mut x).await;
        recv(&mut y).await;

        send(&mut x, ClientMessage::Join).await;
        assert_eq!(recv(&mut x).await, ServerMessage::Waiting);

        send(&mut y, ClientMessage::Join).await;
        assert!(matches!(recv(&mut x).await, ServerMessage::MatchFound(_)));
        assert!(matches!(recv(&mut y).await, ServerMessage::MatchFound(_)));
        assert!(matches!(recv(&mut x).await, ServerMessage::NewQuestion { round: 1, .. }));

        // closing one side ends the match for the other
        x.close(None).await.unwrap();
        loop {
            match recv(&mut y).await {
                ServerMessage::OpponentDisconnected => break,
                ServerMessage::NewQuestion { .. } => continue,
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_connection_limit_sends_overloaded() {
        let config = ServerConfig { max_connections: 1, ..Default::default() };
        let (server, addr) = start_with(config).await;

        let (mut first, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        assert!(matches!(recv(&mut first).await, ServerMessage::Welcome { .. }));

        let (mut second, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let ServerMessage::Error(err) = recv(&mut second).await else {
            panic!("expected error");
        };
        assert_eq!(err.code, ErrorCode::ServerOverloaded);
        assert_eq!(server.connection_count(), 1);

        // the admitted client is unaffected
        send(&mut first, ClientMessage::Ping { timestamp: 3 }).await;
        assert!(matches!(recv(&mut first).await, ServerMessage::Pong { timestamp: 3, .. }));
    }

    #[tokio::test]
    async fn test_shutdown_notifies_clients() {
        let (server, addr) = start().await;
        let (mut socket, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        recv(&mut socket).await;
        assert_eq!(server.connection_count(), 1);

        server.shutdown();
        assert!(matches!(recv(&mut socket).await, ServerMessage::Shutdown { .. }));
    }
}
