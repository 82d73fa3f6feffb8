//! Canvas state engine.
//!
//! One [`CanvasEngine`] exists per collaborative session. It owns the canvas
//! state and is the only thing allowed to mutate it; the UI reads through
//! [`CanvasEngine::state`] and calls the engine's mutators.

use crate::clock::Timestamp;
use crate::history::{DEFAULT_HISTORY_CAPACITY, History};
use crate::operation::{OperationId, SharedOperation};
use crate::presence::{ActiveUser, DEFAULT_PRESENCE_TIMEOUT, PresencePatch, PresenceTracker};
use crate::snapshot::{DEFAULT_SNAPSHOT_CAPACITY, RasterSnapshot, SnapshotBuffer};
use crate::throttle::{DEFAULT_SYNC_WINDOW_MS, SyncThrottle};
use crate::tools::BrushBounds;
use crate::version::CanvasVersion;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rendering-backend representation of the canvas content. Never interpreted
/// by the engine.
pub type CanvasObjects = serde_json::Value;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum operations kept in the log.
    pub history_capacity: usize,
    /// Maximum raster snapshots kept for visual undo.
    pub snapshot_capacity: usize,
    /// Minimum interval between network pushes, in milliseconds.
    pub sync_window_ms: u64,
    /// Silence after which a participant is pruned, in milliseconds.
    pub presence_timeout_ms: u64,
    /// Allowed brush sizes.
    pub brush_bounds: BrushBounds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            sync_window_ms: DEFAULT_SYNC_WINDOW_MS,
            presence_timeout_ms: DEFAULT_PRESENCE_TIMEOUT.as_millis() as u64,
            brush_bounds: BrushBounds::default(),
        }
    }
}

impl EngineConfig {
    pub fn sync_window(&self) -> Duration {
        Duration::from_millis(self.sync_window_ms)
    }

    pub fn presence_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_timeout_ms)
    }
}

/// The aggregate canvas state.
#[derive(Debug, Clone)]
pub struct CanvasState {
    objects: CanvasObjects,
    version: CanvasVersion,
    active_users: PresenceTracker,
}

impl CanvasState {
    fn new(now: Timestamp) -> Self {
        Self {
            objects: CanvasObjects::Null,
            version: CanvasVersion::new(now),
            active_users: PresenceTracker::new(),
        }
    }

    pub fn objects(&self) -> &CanvasObjects {
        &self.objects
    }

    pub fn version(&self) -> u64 {
        self.version.version()
    }

    pub fn last_modified(&self) -> Timestamp {
        self.version.last_modified()
    }

    pub fn active_users(&self) -> &PresenceTracker {
        &self.active_users
    }
}

/// Owns canvas state, history, presence and the sync gate for one session.
#[derive(Debug, Clone)]
pub struct CanvasEngine {
    config: EngineConfig,
    state: CanvasState,
    history: History,
    snapshots: SnapshotBuffer,
    throttle: SyncThrottle,
}

impl Default for CanvasEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CanvasEngine {
    /// Start a session at the current time.
    pub fn new(config: EngineConfig) -> Self {
        Self::new_at(config, Timestamp::now())
    }

    /// Start a session with an explicit clock reading.
    pub fn new_at(config: EngineConfig, now: Timestamp) -> Self {
        Self {
            state: CanvasState::new(now),
            history: History::new(config.history_capacity),
            snapshots: SnapshotBuffer::new(config.snapshot_capacity),
            throttle: SyncThrottle::new(config.sync_window()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the canvas.
    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.state.active_users
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotBuffer {
        &mut self.snapshots
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    // --- History ---

    /// Record a new local operation and bump the version.
    ///
    /// Snapshots taken for operations on the redo stack are dropped, since
    /// the fresh edit makes them unreachable.
    pub fn add_operation(&mut self, op: SharedOperation, now: Timestamp) -> u64 {
        if self.history.can_redo() {
            let stale: Vec<OperationId> = self.history.redo_stack().map(|op| op.id()).collect();
            self.snapshots.discard(&stale);
        }
        log::debug!("Adding {:?} operation {}", op.kind(), op.id());
        self.history.add_operation(op);
        self.state.version.bump(now)
    }

    /// Undo the most recent local operation. The caller restores the canvas
    /// to the state before the returned operation, e.g. from
    /// [`Self::snapshot_before`].
    pub fn undo(&mut self, now: Timestamp) -> Option<SharedOperation> {
        let Some(op) = self.history.undo() else {
            log::trace!("Nothing to undo");
            return None;
        };
        log::debug!("Undid operation {}", op.id());
        self.state.version.bump(now);
        Some(op)
    }

    /// Redo the most recently undone operation. The caller re-applies it.
    pub fn redo(&mut self, now: Timestamp) -> Option<SharedOperation> {
        let Some(op) = self.history.redo() else {
            log::trace!("Nothing to redo");
            return None;
        };
        log::debug!("Redid operation {}", op.id());
        self.state.version.bump(now);
        Some(op)
    }

    /// Forget all history and snapshots, e.g. after a canvas clear or a
    /// session reset.
    pub fn clear_history(&mut self, now: Timestamp) -> u64 {
        self.history.clear_history();
        self.snapshots.clear();
        log::debug!("Cleared history");
        self.state.version.bump(now)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Canvas content ---

    /// Replace the rendering-backend representation.
    pub fn set_objects(&mut self, objects: CanvasObjects, now: Timestamp) -> u64 {
        self.state.objects = objects;
        self.state.version.bump(now)
    }

    /// Store the raster snapshot taken before `operation` is applied.
    pub fn record_snapshot(&mut self, operation: OperationId, width: u32, height: u32, data: Vec<u8>) {
        self.snapshots.push(operation, width, height, data);
    }

    /// The raster snapshot taken before `operation`, if still buffered.
    pub fn snapshot_before(&self, operation: OperationId) -> Option<&RasterSnapshot> {
        self.snapshots.before(operation)
    }

    // --- Presence ---

    pub fn add_or_update_user(&mut self, address: impl Into<String>, patch: &PresencePatch, now: Timestamp) {
        self.state.active_users.add_or_update_user_at(address, patch, now);
    }

    pub fn remove_user(&mut self, address: &str) -> Option<ActiveUser> {
        self.state.active_users.remove_user(address)
    }

    pub fn update_cursor(&mut self, address: &str, cursor: Option<Point>, now: Timestamp) -> bool {
        self.state.active_users.update_cursor_at(address, cursor, now)
    }

    /// Forget every remote participant, e.g. after leaving a room.
    pub fn clear_presence(&mut self) {
        self.state.active_users.clear();
    }

    /// Drop participants silent for longer than the configured timeout.
    pub fn prune_idle_users(&mut self, now: Timestamp) -> Vec<String> {
        let removed = self
            .state
            .active_users
            .prune_idle(now, self.config.presence_timeout());
        if !removed.is_empty() {
            log::debug!("Pruned idle participants: {:?}", removed);
        }
        removed
    }

    // --- Sync gate ---

    pub fn should_sync(&self, now: Timestamp) -> bool {
        self.throttle.should_sync(now)
    }

    pub fn mark_synced(&mut self, now: Timestamp) {
        self.throttle.mark_synced(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PaintColor;
    use crate::operation::Operation;
    use std::sync::Arc;

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn engine() -> CanvasEngine {
        CanvasEngine::new_at(EngineConfig::default(), at(0))
    }

    fn stroke() -> SharedOperation {
        Operation::draw("0xabc", vec![Point::new(1.0, 1.0)], PaintColor::black(), 3, 1.0).into_shared()
    }

    #[test]
    fn test_version_starts_at_one() {
        let engine = engine();
        assert_eq!(engine.version(), 1);
        assert_eq!(engine.state().last_modified(), at(0));
    }

    #[test]
    fn test_mutations_bump_version() {
        let mut engine = engine();
        engine.add_operation(stroke(), at(10));
        assert_eq!(engine.version(), 2);
        assert_eq!(engine.state().last_modified(), at(10));

        engine.undo(at(20));
        assert_eq!(engine.version(), 3);
        engine.redo(at(30));
        assert_eq!(engine.version(), 4);
        engine.clear_history(at(40));
        assert_eq!(engine.version(), 5);
        engine.set_objects(serde_json::json!({"objects": []}), at(50));
        assert_eq!(engine.version(), 6);
    }

    #[test]
    fn test_noop_undo_redo_keep_version() {
        let mut engine = engine();
        assert!(engine.undo(at(10)).is_none());
        assert!(engine.redo(at(10)).is_none());
        assert_eq!(engine.version(), 1);
    }

    #[test]
    fn test_presence_does_not_bump_version() {
        let mut engine = engine();
        engine.add_or_update_user("0xabc", &PresencePatch::drawing(true), at(5));
        engine.update_cursor("0xabc", Some(Point::new(1.0, 2.0)), at(6));
        engine.remove_user("0xabc");
        assert_eq!(engine.version(), 1);
    }

    #[test]
    fn test_undo_returns_snapshot_key() {
        let mut engine = engine();
        let op = stroke();
        engine.record_snapshot(op.id(), 1, 1, vec![9, 9, 9, 9]);
        engine.add_operation(op.clone(), at(1));

        let undone = engine.undo(at(2)).unwrap();
        assert!(Arc::ptr_eq(&undone, &op));
        assert_eq!(engine.snapshot_before(undone.id()).unwrap().data, vec![9, 9, 9, 9]);
    }

    #[test]
    fn test_new_edit_discards_redo_snapshots() {
        let mut engine = engine();
        let a = stroke();
        let b = stroke();
        engine.record_snapshot(a.id(), 1, 1, Vec::new());
        engine.add_operation(a.clone(), at(1));
        engine.record_snapshot(b.id(), 1, 1, Vec::new());
        engine.add_operation(b.clone(), at(2));

        engine.undo(at(3));
        engine.add_operation(stroke(), at(4));

        assert!(engine.snapshot_before(a.id()).is_some());
        assert!(engine.snapshot_before(b.id()).is_none());
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_clear_history_drops_snapshots() {
        let mut engine = engine();
        let op = stroke();
        engine.record_snapshot(op.id(), 1, 1, Vec::new());
        engine.add_operation(op, at(1));

        engine.clear_history(at(2));
        assert!(engine.snapshots().is_empty());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_custom_capacity() {
        let config = EngineConfig {
            history_capacity: 3,
            ..EngineConfig::default()
        };
        let mut engine = CanvasEngine::new_at(config, at(0));
        for i in 0..5 {
            engine.add_operation(stroke(), at(i));
        }
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.version(), 6);
    }

    #[test]
    fn test_sync_gate() {
        let mut engine = engine();
        assert!(engine.should_sync(at(1_000)));
        engine.mark_synced(at(1_000));
        assert!(!engine.should_sync(at(1_100)));
        assert!(engine.should_sync(at(1_101)));
    }

    #[test]
    fn test_prune_idle_users() {
        let mut engine = engine();
        engine.add_or_update_user("0xabc", &PresencePatch::default(), at(0));
        engine.add_or_update_user("0xdef", &PresencePatch::default(), at(25_000));

        let removed = engine.prune_idle_users(at(31_000));
        assert_eq!(removed, vec!["0xabc".to_string()]);
        assert_eq!(engine.presence().active_user_count(), 1);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"sync_window_ms": 250}"#).unwrap();
        assert_eq!(config.sync_window(), Duration::from_millis(250));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }
}
