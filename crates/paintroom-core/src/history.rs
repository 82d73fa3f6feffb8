//! Operation log with linear undo/redo.
//!
//! The log keeps a bounded record of every local operation plus two stacks
//! that decide which of them are logically applied. Undo and redo move whole
//! operations between the stacks; reconstructing pixels is the caller's job
//! (see [`crate::snapshot::SnapshotBuffer`]).

use crate::operation::{OperationKind, SharedOperation};
use std::collections::VecDeque;

/// Default maximum number of operations kept in the log.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Append-only operation log with undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    /// Full record, oldest first.
    operations: VecDeque<SharedOperation>,
    /// Operations eligible for undo, most recent last.
    undo_stack: VecDeque<SharedOperation>,
    /// Operations most recently undone, most recent last.
    redo_stack: Vec<SharedOperation>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            operations: VecDeque::with_capacity(capacity),
            undo_stack: VecDeque::with_capacity(capacity),
            redo_stack: Vec::new(),
            capacity,
        }
    }

    /// Record a new operation. Clears the redo stack.
    pub fn add_operation(&mut self, op: SharedOperation) {
        if self.operations.len() == self.capacity {
            self.operations.pop_front();
        }
        self.operations.push_back(op.clone());

        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(op);

        // New edits invalidate redo history
        self.redo_stack.clear();
    }

    /// Move the most recent operation from the undo stack to the redo stack.
    /// Returns `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<SharedOperation> {
        let op = self.undo_stack.pop_back()?;
        self.redo_stack.push(op.clone());
        Some(op)
    }

    /// Move the most recently undone operation back onto the undo stack.
    /// Returns `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<SharedOperation> {
        let op = self.redo_stack.pop()?;
        self.undo_stack.push_back(op.clone());
        Some(op)
    }

    /// Drop the log and both stacks.
    pub fn clear_history(&mut self) {
        self.operations.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Logged operations, oldest first.
    pub fn operations(&self) -> impl DoubleEndedIterator<Item = &SharedOperation> + ExactSizeIterator {
        self.operations.iter()
    }

    /// Undo stack, bottom first.
    pub fn undo_stack(&self) -> impl DoubleEndedIterator<Item = &SharedOperation> + ExactSizeIterator {
        self.undo_stack.iter()
    }

    /// Redo stack, bottom first.
    pub fn redo_stack(&self) -> impl DoubleEndedIterator<Item = &SharedOperation> + ExactSizeIterator {
        self.redo_stack.iter()
    }

    /// Operations that are currently visible, in application order.
    ///
    /// Everything up to and including the most recent applied clear is
    /// hidden by it, so replay starts right after that clear.
    pub fn replay(&self) -> impl Iterator<Item = &SharedOperation> {
        let start = self
            .undo_stack
            .iter()
            .rposition(|op| op.kind() == OperationKind::Clear)
            .map_or(0, |i| i + 1);
        self.undo_stack.iter().skip(start)
    }

    /// Number of logged operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PaintColor;
    use crate::operation::Operation;
    use kurbo::Point;
    use std::sync::Arc;

    fn stroke(user: &str) -> SharedOperation {
        Operation::draw(user, vec![Point::new(0.0, 0.0)], PaintColor::black(), 4, 1.0).into_shared()
    }

    fn ids<'a>(ops: impl Iterator<Item = &'a SharedOperation>) -> Vec<crate::operation::OperationId> {
        ops.map(|op| op.id()).collect()
    }

    #[test]
    fn test_undo_returns_most_recent_in_reverse() {
        let mut history = History::default();
        let ops: Vec<_> = (0..5).map(|_| stroke("0xabc")).collect();
        for op in &ops {
            history.add_operation(op.clone());
        }

        for k in 1..=3 {
            let undone = history.undo().unwrap();
            assert!(Arc::ptr_eq(&undone, &ops[5 - k]));
            assert_eq!(history.undo_stack().len(), 5 - k);
            assert_eq!(history.redo_stack().len(), k);
        }
    }

    #[test]
    fn test_redo_restores_same_reference() {
        let mut history = History::default();
        history.add_operation(stroke("0xabc"));
        let undone = history.undo().unwrap();
        let redone = history.redo().unwrap();
        assert!(Arc::ptr_eq(&undone, &redone));
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_operation_clears_redo() {
        let mut history = History::default();
        history.add_operation(stroke("0xabc"));
        history.add_operation(stroke("0xabc"));
        history.undo();
        history.undo();
        assert!(history.can_redo());

        history.add_operation(stroke("0xabc"));
        assert!(!history.can_redo());
        assert_eq!(history.redo_stack().len(), 0);
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(history.undo().is_none());
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(DEFAULT_HISTORY_CAPACITY);
        let ops: Vec<_> = (0..DEFAULT_HISTORY_CAPACITY + 3).map(|_| stroke("0xabc")).collect();

        for (i, op) in ops.iter().enumerate() {
            history.add_operation(op.clone());
            assert_eq!(history.len(), (i + 1).min(DEFAULT_HISTORY_CAPACITY));
        }

        // Exactly the three oldest were evicted
        let first = history.operations().next().unwrap();
        assert!(Arc::ptr_eq(first, &ops[3]));
        assert_eq!(history.undo_stack().len(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_undo_redo_scenario() {
        let mut history = History::default();
        let (a, b, c, d) = (stroke("a"), stroke("b"), stroke("c"), stroke("d"));
        history.add_operation(a.clone());
        history.add_operation(b.clone());
        history.add_operation(c.clone());

        history.undo();
        history.undo();
        assert_eq!(ids(history.undo_stack()), vec![a.id()]);
        assert_eq!(ids(history.redo_stack()), vec![c.id(), b.id()]);

        history.add_operation(d.clone());
        assert_eq!(ids(history.undo_stack()), vec![a.id(), d.id()]);
        assert_eq!(history.redo_stack().len(), 0);
        // The log still holds everything that was ever appended
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_stacks_stay_disjoint() {
        let mut history = History::default();
        for _ in 0..4 {
            history.add_operation(stroke("0xabc"));
        }
        history.undo();
        history.undo();
        history.redo();

        let undo = ids(history.undo_stack());
        for id in ids(history.redo_stack()) {
            assert!(!undo.contains(&id));
        }
    }

    #[test]
    fn test_clear_history() {
        let mut history = History::default();
        history.add_operation(stroke("0xabc"));
        history.add_operation(stroke("0xabc"));
        history.undo();

        history.clear_history();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_replay_starts_after_clear() {
        let mut history = History::default();
        let a = stroke("0xabc");
        let clear = Operation::clear("0xabc").into_shared();
        let b = stroke("0xabc");
        history.add_operation(a.clone());
        history.add_operation(clear);
        history.add_operation(b.clone());

        assert_eq!(ids(history.replay()), vec![b.id()]);

        // Undoing the stroke and the clear brings the first stroke back
        history.undo();
        history.undo();
        assert_eq!(ids(history.replay()), vec![a.id()]);
    }
}
