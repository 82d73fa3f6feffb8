//! Bounded buffer of raster snapshots for fast visual undo.
//!
//! The rendering layer hands over an opaque pixel blob each time it is about
//! to apply an operation. Undoing that operation restores the snapshot taken
//! before it instead of replaying the whole log.

use crate::operation::OperationId;
use std::collections::VecDeque;

/// Default maximum number of raster snapshots kept.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 50;

/// Opaque pixel data captured before an operation was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSnapshot {
    /// Operation this snapshot precedes.
    pub operation: OperationId,
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in whatever layout the renderer uses.
    pub data: Vec<u8>,
}

/// Fixed-capacity ring buffer of snapshots, evicting the oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<RasterSnapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Store the snapshot taken before `operation`.
    pub fn push(&mut self, operation: OperationId, width: u32, height: u32, data: Vec<u8>) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(RasterSnapshot {
            operation,
            width,
            height,
            data,
        });
    }

    /// The snapshot taken right before `operation` was applied.
    pub fn before(&self, operation: OperationId) -> Option<&RasterSnapshot> {
        self.snapshots.iter().rev().find(|s| s.operation == operation)
    }

    /// Drop snapshots keyed to the given operations, e.g. the redo stack
    /// when a fresh edit makes it unreachable.
    pub fn discard<'a>(&mut self, operations: impl IntoIterator<Item = &'a OperationId>) {
        let discarded: Vec<OperationId> = operations.into_iter().copied().collect();
        self.snapshots.retain(|s| !discarded.contains(&s.operation));
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
