//! PaintRoom WebSocket Relay Server
//!
//! Forwards operations, undo/redo notices and presence between the clients
//! of a room. The relay does not merge or interpret operations; it only keeps
//! a bounded log of recent ones so late joiners can catch up.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "gallery-7", "address": "0xabc" }
//! { "type": "operation", "op": { "id": "…", "kind": "draw", … } }
//! { "type": "presence", "patch": { "cursor": { "x": 100, "y": 200 } } }
//! ```

mod config;
mod room;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use config::RelayConfig;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use paintroom_core::{ClientMessage, ServerMessage};
use room::{Envelope, Rooms};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paintroom_relay=info,tower_http=info".into()),
        )
        .init();

    let config = RelayConfig::from_env();
    let state = Arc::new(Rooms::new(config.room_history));

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("PaintRoom relay listening on {}", config.addr);
    info!("Keeping {} operations per room", config.room_history);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await
}

/// Index page
async fn index() -> &'static str {
    "PaintRoom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(rooms): State<Arc<Rooms>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, rooms))
}

/// Room membership of one connection.
struct Membership {
    room: String,
    address: String,
    rx: broadcast::Receiver<Envelope>,
}

/// Per-connection state.
struct Connection {
    id: String,
    membership: Option<Membership>,
}

impl Connection {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            membership: None,
        }
    }

    /// Apply a client message. Returns the reply for this client, if any.
    fn handle(&mut self, rooms: &Rooms, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { room, address } => {
                self.leave(rooms);

                let (rx, joined) = rooms.join(&room, &self.id, &address);
                rooms.broadcast(
                    &room,
                    &self.id,
                    ServerMessage::PeerJoined {
                        address: address.clone(),
                    },
                );
                info!("{} ({}) joined room {}", address, self.id, room);

                self.membership = Some(Membership { room, address, rx });
                Some(joined)
            }
            ClientMessage::Leave => {
                self.leave(rooms);
                None
            }
            msg => {
                let Some(Membership { room, address, .. }) = &self.membership else {
                    return Some(ServerMessage::Error {
                        message: "Not in a room".to_string(),
                    });
                };
                let from = address.clone();
                let outgoing = match msg {
                    ClientMessage::Operation { op } => {
                        rooms.record_operation(room, &op);
                        ServerMessage::Operation { from, op }
                    }
                    ClientMessage::Undo { id } => {
                        rooms.record_undo(room, address, id);
                        ServerMessage::Undo { from, id }
                    }
                    ClientMessage::Redo { id } => {
                        rooms.record_redo(room, address, id);
                        ServerMessage::Redo { from, id }
                    }
                    ClientMessage::Presence { patch } => {
                        rooms.update_presence(room, address, &patch);
                        ServerMessage::Presence { from, patch }
                    }
                    ClientMessage::Join { .. } | ClientMessage::Leave => return None,
                };
                rooms.broadcast(room, &self.id, outgoing);
                None
            }
        }
    }

    fn leave(&mut self, rooms: &Rooms) {
        if let Some(Membership { room, address, .. }) = self.membership.take() {
            let departure = rooms.leave(&room, &self.id);
            // Peers only lose the participant once their last connection is gone
            if departure.is_some_and(|d| d.last_connection) {
                rooms.broadcast(&room, &self.id, ServerMessage::PeerLeft { address: address.clone() });
            }
            info!("{} ({}) left room {}", address, self.id, room);
        }
    }
}

/// Send a message; returns false once the socket is gone.
async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match msg.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", msg, e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, rooms: Arc<Rooms>) {
    let mut conn = Connection::new();
    info!("New connection: {}", conn.id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match ClientMessage::from_json(&text) {
                            Ok(client_msg) => conn.handle(&rooms, client_msg),
                            Err(e) => {
                                warn!("Invalid message from {}: {}", conn.id, e);
                                Some(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if !send(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = ServerMessage::Error {
                            message: "Binary messages are not supported".to_string(),
                        };
                        if !send(&mut sender, &err).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from room
            envelope = async {
                match &mut conn.membership {
                    Some(membership) => loop {
                        match membership.rx.recv().await {
                            Ok(envelope) => break envelope,
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("{} fell behind, skipped {} messages", membership.address, skipped);
                            }
                            Err(RecvError::Closed) => std::future::pending::<()>().await,
                        }
                    },
                    // No room joined, just wait forever
                    None => std::future::pending::<Envelope>().await,
                }
            } => {
                let (from, server_msg) = envelope;
                // Don't echo back to sender
                if from != conn.id && !send(&mut sender, &server_msg).await {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    conn.leave(&rooms);
    info!("Connection closed: {}", conn.id);
}
