//! Messages exchanged with the relay.
//!
//! All messages are JSON objects tagged by a `"type"` field:
//! ```json
//! { "type": "join", "room": "gallery-7", "address": "0xabc" }
//! { "type": "operation", "op": { "id": "…", "kind": "draw", … } }
//! { "type": "presence", "patch": { "cursor": { "x": 10, "y": 20 } } }
//! ```

use crate::operation::{Operation, OperationId, SharedOperation};
use crate::presence::{ActiveUser, PresencePatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Messages sent to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room as `address`
    Join { room: String, address: String },
    /// Leave current room
    Leave,
    /// A new local operation
    Operation { op: Operation },
    /// The author undid one of their operations
    Undo { id: OperationId },
    /// The author redid one of their operations
    Redo { id: OperationId },
    /// Presence change (cursor, color, drawing flag)
    Presence { patch: PresencePatch },
}

/// Messages received from the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with the current room state
    Joined {
        room: String,
        peer_count: usize,
        /// Participants already in the room
        #[serde(default)]
        users: Vec<ActiveUser>,
        /// Recent operations, oldest first, for replay
        #[serde(default)]
        operations: Vec<Operation>,
    },
    /// Peer joined the room
    PeerJoined { address: String },
    /// Peer left the room
    PeerLeft { address: String },
    /// Operation from another peer
    Operation { from: String, op: Operation },
    /// Another peer undid an operation
    Undo { from: String, id: OperationId },
    /// Another peer redid an operation
    Redo { from: String, id: OperationId },
    /// Presence update from another peer
    Presence { from: String, patch: PresencePatch },
    /// Error message
    Error { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What an inbound message meant for the local session.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Joined a room; `operations` should be replayed onto the canvas
    JoinedRoom {
        room: String,
        peer_count: usize,
        operations: Vec<SharedOperation>,
    },
    /// A peer joined the room
    PeerJoined { address: String },
    /// A peer left the room
    PeerLeft { address: String },
    /// Apply a remote operation
    RemoteOperation { from: String, op: SharedOperation },
    /// Revert a remote operation
    RemoteUndo { from: String, id: OperationId },
    /// Re-apply a remote operation
    RemoteRedo { from: String, id: OperationId },
    /// A participant's presence record changed
    PresenceUpdated { address: String },
    /// Error reported by the relay
    Error { message: String },
}
