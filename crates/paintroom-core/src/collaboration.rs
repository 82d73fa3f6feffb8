//! Collaboration session: the bridge between the engine and the relay.
//!
//! The session never touches the network. Local actions update the engine
//! and leave a pending delta behind; [`CollaborationSession::flush`] turns
//! pending deltas into wire messages when the sync gate allows it, and the
//! caller's transport sends them. Inbound messages are fed to
//! [`CollaborationSession::handle_message`].

use crate::clock::Timestamp;
use crate::color::PaintColor;
use crate::engine::CanvasEngine;
use crate::operation::{Operation, OperationData, OperationKind, SharedOperation};
use crate::presence::PresencePatch;
use crate::protocol::{ClientMessage, ServerMessage, SyncEvent};
use crate::tools::{StrokeRecorder, ToolSettings};
use kurbo::Point;

/// Local participant state plus outbound queues for one room.
pub struct CollaborationSession {
    /// Local identity, as supplied by the wallet.
    address: String,
    engine: CanvasEngine,
    /// Current room ID (set when the relay confirms the join).
    current_room: Option<String>,
    /// Room requested by `join_room` and not yet confirmed.
    joining: Option<String>,
    /// A join has been handed to the transport and not yet confirmed.
    join_in_flight: bool,
    recorder: StrokeRecorder,
    /// Join/leave messages. Never throttled.
    control: Vec<ClientMessage>,
    /// Operation, undo and redo deltas, in order.
    pending_ops: Vec<ClientMessage>,
    /// Coalesced presence change.
    pending_presence: PresencePatch,
}

impl CollaborationSession {
    pub fn new(address: impl Into<String>, engine: CanvasEngine) -> Self {
        Self {
            address: address.into(),
            engine,
            current_room: None,
            joining: None,
            join_in_flight: false,
            recorder: StrokeRecorder::new(),
            control: Vec::new(),
            pending_ops: Vec::new(),
            pending_presence: PresencePatch::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn engine(&self) -> &CanvasEngine {
        &self.engine
    }

    /// Mutable engine access, e.g. for recording raster snapshots.
    pub fn engine_mut(&mut self) -> &mut CanvasEngine {
        &mut self.engine
    }

    /// End the session and hand back the engine.
    pub fn into_engine(self) -> CanvasEngine {
        self.engine
    }

    // --- Room Management ---

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }

    /// True between `join_room` and the relay's confirmation.
    pub fn is_joining(&self) -> bool {
        self.joining.is_some()
    }

    /// Request to join a room. Queues the join message.
    ///
    /// Deltas produced before the relay confirms are held and sent after
    /// the confirmation. Switching rooms drops whatever belonged to the old
    /// one.
    pub fn join_room(&mut self, room: &str) {
        if self.current_room.as_deref().is_some_and(|current| current != room) {
            self.current_room = None;
            self.reset_room_state();
        }
        self.joining = Some(room.to_string());
        self.control.push(ClientMessage::Join {
            room: room.to_string(),
            address: self.address.clone(),
        });
    }

    /// Leave the current room, or abandon a join in progress. Remote
    /// presence and unsent deltas are dropped.
    pub fn leave_room(&mut self) {
        let was_joined = self.current_room.take().is_some();
        let was_joining = self.joining.take().is_some();
        if !was_joined && !was_joining {
            return;
        }

        self.control.retain(|msg| !matches!(msg, ClientMessage::Join { .. }));
        // The relay only needs to hear about it if a join already went out
        if was_joined || self.join_in_flight {
            self.control.push(ClientMessage::Leave);
        }
        self.join_in_flight = false;
        self.reset_room_state();
    }

    fn reset_room_state(&mut self) {
        self.engine.clear_presence();
        self.pending_ops.clear();
        self.pending_presence = PresencePatch::default();
    }

    // --- Drawing ---

    /// Pointer down.
    pub fn begin_stroke(&mut self, point: Point) {
        self.recorder.begin(point);
        self.queue_presence(PresencePatch {
            cursor: Some(Some(point)),
            is_drawing: Some(true),
            ..PresencePatch::default()
        });
    }

    /// Pointer move while drawing.
    pub fn extend_stroke(&mut self, point: Point) {
        self.recorder.update(point);
        self.queue_presence(PresencePatch::cursor(Some(point)));
    }

    /// Pointer up. Commits the stroke as an operation, if one was in progress.
    pub fn end_stroke(
        &mut self,
        settings: &ToolSettings,
        color: PaintColor,
        now: Timestamp,
    ) -> Option<SharedOperation> {
        let op = self.recorder.end(&self.address, settings, color)?;
        self.queue_presence(PresencePatch::drawing(false));
        Some(self.commit(op, now))
    }

    /// Abandon the stroke in progress.
    pub fn cancel_stroke(&mut self) {
        if self.recorder.is_active() {
            self.recorder.cancel();
            self.queue_presence(PresencePatch::drawing(false));
        }
    }

    /// Points of the stroke in progress, for live preview.
    pub fn stroke_preview(&self) -> &[Point] {
        self.recorder.points()
    }

    /// Record a finished operation and queue it for the relay.
    pub fn commit(&mut self, op: Operation, now: Timestamp) -> SharedOperation {
        let op = op.into_shared();
        self.engine.add_operation(op.clone(), now);
        self.queue_op(ClientMessage::Operation {
            op: Operation::clone(&op),
        });
        op
    }

    /// Clear the canvas. The clear is an ordinary operation, so it can be
    /// undone.
    pub fn clear_canvas(&mut self, now: Timestamp) -> SharedOperation {
        let op = Operation::new(OperationKind::Clear, self.address.clone(), OperationData::Empty, now);
        self.commit(op, now)
    }

    pub fn undo(&mut self, now: Timestamp) -> Option<SharedOperation> {
        let op = self.engine.undo(now)?;
        self.queue_op(ClientMessage::Undo { id: op.id() });
        Some(op)
    }

    pub fn redo(&mut self, now: Timestamp) -> Option<SharedOperation> {
        let op = self.engine.redo(now)?;
        self.queue_op(ClientMessage::Redo { id: op.id() });
        Some(op)
    }

    // --- Presence ---

    /// Update the local cursor (None when the pointer left the canvas).
    pub fn move_cursor(&mut self, cursor: Option<Point>) {
        self.queue_presence(PresencePatch::cursor(cursor));
    }

    /// Announce whether the local participant is mid-stroke without going
    /// through the stroke recorder, e.g. for shape tools drawn elsewhere.
    pub fn set_drawing(&mut self, is_drawing: bool) {
        self.queue_presence(PresencePatch::drawing(is_drawing));
    }

    /// Announce the locally selected color.
    pub fn select_color(&mut self, color: Option<PaintColor>) {
        self.queue_presence(PresencePatch::selected_color(color));
    }

    /// Drop remote participants that went silent.
    pub fn prune_idle(&mut self, now: Timestamp) -> Vec<String> {
        self.engine.prune_idle_users(now)
    }

    // --- Outbound ---

    /// Whether deltas should be kept for the relay. Outside a room, edits
    /// stay local.
    fn is_connected(&self) -> bool {
        self.current_room.is_some() || self.joining.is_some()
    }

    fn queue_op(&mut self, msg: ClientMessage) {
        if self.is_connected() {
            self.pending_ops.push(msg);
        }
    }

    fn queue_presence(&mut self, patch: PresencePatch) {
        if self.is_connected() {
            self.pending_presence.merge(patch);
        }
    }

    /// Check if there are deltas or control messages waiting.
    pub fn has_pending(&self) -> bool {
        !self.control.is_empty() || !self.pending_ops.is_empty() || !self.pending_presence.is_empty()
    }

    /// Drain whatever may be sent at `now`, serialized as JSON.
    ///
    /// Control messages always go out. Deltas go out only once the room is
    /// confirmed and the sync gate is open; otherwise they stay queued for a
    /// later flush.
    pub fn flush(&mut self, now: Timestamp) -> Vec<String> {
        let mut batch: Vec<ClientMessage> = std::mem::take(&mut self.control);
        if self.joining.is_some() && batch.iter().any(|msg| matches!(msg, ClientMessage::Join { .. })) {
            self.join_in_flight = true;
        }

        let has_deltas = !self.pending_ops.is_empty() || !self.pending_presence.is_empty();
        if has_deltas && self.is_in_room() && self.engine.should_sync(now) {
            batch.append(&mut self.pending_ops);
            let patch = std::mem::take(&mut self.pending_presence);
            if !patch.is_empty() {
                batch.push(ClientMessage::Presence { patch });
            }
            self.engine.mark_synced(now);
        }

        batch
            .iter()
            .filter_map(|msg| match msg.to_json() {
                Ok(json) => Some(json),
                Err(e) => {
                    log::error!("Failed to encode {:?}: {}", msg, e);
                    None
                }
            })
            .collect()
    }

    // --- Inbound ---

    /// Handle an incoming relay message.
    /// Returns a SyncEvent describing what happened, or None if the message
    /// was ignored.
    pub fn handle_message(&mut self, json: &str, now: Timestamp) -> Option<SyncEvent> {
        let msg = match ServerMessage::from_json(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Ignoring relay message: {}", e);
                return None;
            }
        };

        let room_scoped = !matches!(msg, ServerMessage::Joined { .. } | ServerMessage::Error { .. });
        if room_scoped && !self.is_in_room() {
            log::debug!("Ignoring {:?} outside a room", msg);
            return None;
        }

        match msg {
            ServerMessage::Joined {
                room,
                peer_count,
                users,
                operations,
            } => {
                if self.joining.as_deref() != Some(room.as_str()) {
                    // Confirmation of a join that was abandoned or superseded
                    log::debug!("Ignoring stale confirmation for room {}", room);
                    return None;
                }
                log::info!("Joined room {} with {} peers", room, peer_count);
                self.joining = None;
                self.join_in_flight = false;
                self.current_room = Some(room.clone());
                for user in users.into_iter().filter(|u| u.address != self.address) {
                    let patch = PresencePatch {
                        cursor: Some(user.cursor),
                        selected_color: Some(user.selected_color),
                        is_drawing: Some(user.is_drawing),
                    };
                    self.engine.add_or_update_user(user.address, &patch, now);
                }
                Some(SyncEvent::JoinedRoom {
                    room,
                    peer_count,
                    operations: operations.into_iter().map(Operation::into_shared).collect(),
                })
            }
            ServerMessage::PeerJoined { address } => {
                if address == self.address {
                    return None;
                }
                self.engine
                    .add_or_update_user(address.clone(), &PresencePatch::default(), now);
                Some(SyncEvent::PeerJoined { address })
            }
            ServerMessage::PeerLeft { address } => {
                self.engine.remove_user(&address);
                Some(SyncEvent::PeerLeft { address })
            }
            ServerMessage::Operation { from, op } => {
                if from == self.address {
                    return None;
                }
                Some(SyncEvent::RemoteOperation {
                    from,
                    op: op.into_shared(),
                })
            }
            ServerMessage::Undo { from, id } => {
                (from != self.address).then_some(SyncEvent::RemoteUndo { from, id })
            }
            ServerMessage::Redo { from, id } => {
                (from != self.address).then_some(SyncEvent::RemoteRedo { from, id })
            }
            ServerMessage::Presence { from, patch } => {
                if from == self.address {
                    return None;
                }
                self.engine.add_or_update_user(from.clone(), &patch, now);
                Some(SyncEvent::PresenceUpdated { address: from })
            }
            ServerMessage::Error { message } => {
                log::warn!("Relay error: {}", message);
                Some(SyncEvent::Error { message })
            }
        }
    }
}
