//! Room registry shared by all connections.

use dashmap::DashMap;
use paintroom_core::{Operation, OperationId, PresencePatch, PresenceTracker, ServerMessage};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A broadcast message tagged with the connection that caused it.
pub type Envelope = (String, ServerMessage);

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<Envelope>,
    /// Connection ID -> participant address
    peers: HashMap<String, String>,
    /// Presence of everyone in the room
    roster: PresenceTracker,
    /// Recent operations, oldest first
    operations: VecDeque<Operation>,
    /// Logged operations currently undone by their author
    undone: HashSet<OperationId>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashMap::new(),
            roster: PresenceTracker::new(),
            operations: VecDeque::new(),
            undone: HashSet::new(),
        }
    }

    fn has_address(&self, address: &str) -> bool {
        self.peers.values().any(|a| a == address)
    }

    /// Operations a joiner should draw, oldest first.
    fn visible_operations(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| !self.undone.contains(&op.id()))
            .cloned()
            .collect()
    }

    fn is_authored_by(&self, id: OperationId, address: &str) -> bool {
        self.operations
            .iter()
            .any(|op| op.id() == id && op.user_id() == address)
    }
}

/// A connection leaving a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub address: String,
    /// No other connection of this address remains in the room.
    pub last_connection: bool,
}

/// Active rooms, created on first join and removed when the last peer leaves.
pub struct Rooms {
    rooms: DashMap<String, Room>,
    history: usize,
}

impl Rooms {
    /// `history` is the number of operations each room keeps for joiners.
    pub fn new(history: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            history,
        }
    }

    /// Add a connection to a room. Returns its subscription and the `Joined`
    /// reply carrying the other participants and the recent operations.
    pub fn join(
        &self,
        room_id: &str,
        connection: &str,
        address: &str,
    ) -> (broadcast::Receiver<Envelope>, ServerMessage) {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(connection.to_string(), address.to_string());
        room.roster.add_or_update_user(address, &PresencePatch::default());

        let joined = ServerMessage::Joined {
            room: room_id.to_string(),
            peer_count: room.peers.len(),
            users: room
                .roster
                .iter()
                .filter(|user| user.address != address)
                .cloned()
                .collect(),
            operations: room.visible_operations(),
        };
        (room.tx.subscribe(), joined)
    }

    /// Remove a connection from a room.
    pub fn leave(&self, room_id: &str, connection: &str) -> Option<Departure> {
        let departure = {
            let mut room = self.rooms.get_mut(room_id)?;
            let address = room.peers.remove(connection)?;
            // The same participant may still be connected elsewhere
            let last_connection = !room.has_address(&address);
            if last_connection {
                room.roster.remove_user(&address);
            }
            Departure {
                address,
                last_connection,
            }
        };
        self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
        Some(departure)
    }

    /// Append to the room's replay log, evicting the oldest beyond capacity.
    pub fn record_operation(&self, room_id: &str, op: &Operation) {
        if self.history == 0 {
            return;
        }
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            if room.operations.len() == self.history {
                if let Some(evicted) = room.operations.pop_front() {
                    room.undone.remove(&evicted.id());
                }
            }
            room.operations.push_back(op.clone());
        }
    }

    /// Hide a logged operation from joiners after its author undid it.
    /// Returns false if the operation is not logged or `address` is not its
    /// author.
    pub fn record_undo(&self, room_id: &str, address: &str, id: OperationId) -> bool {
        self.rooms.get_mut(room_id).is_some_and(|mut room| {
            room.is_authored_by(id, address) && room.undone.insert(id)
        })
    }

    /// Show a previously undone operation again after its author redid it.
    pub fn record_redo(&self, room_id: &str, address: &str, id: OperationId) -> bool {
        self.rooms.get_mut(room_id).is_some_and(|mut room| {
            room.is_authored_by(id, address) && room.undone.remove(&id)
        })
    }

    pub fn update_presence(&self, room_id: &str, address: &str, patch: &PresencePatch) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.roster.add_or_update_user(address, patch);
        }
    }

    /// Broadcast message to room
    pub fn broadcast(&self, room_id: &str, connection: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            // No receivers is fine
            let _ = room.tx.send((connection.to_string(), msg));
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }
}
