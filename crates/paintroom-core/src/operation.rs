//! Drawing operations.
//!
//! An [`Operation`] is the unit of history: one pointer-down → move → up
//! interaction, or a full clear. Operations are immutable once built and are
//! passed around as [`SharedOperation`] so that moving one between the undo
//! and redo stacks keeps the same allocation.

use crate::clock::Timestamp;
use crate::color::PaintColor;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Reference-counted, immutable operation.
pub type SharedOperation = Arc<Operation>;

/// Unique, creation-ordered operation identifier.
///
/// Backed by a UUIDv7, so ids compare in the order they were generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What an operation does to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Draw,
    Erase,
    Clear,
}

/// A stroke along a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Points in drawing order.
    pub path: Vec<Point>,
    /// Paint color. Erase strokes carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<PaintColor>,
    /// Brush diameter in canvas pixels.
    pub brush_size: u32,
    /// Stroke opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

/// Payload of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum OperationData {
    Stroke(Stroke),
    /// Clears carry no payload.
    Empty,
}

/// An immutable record of one user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    id: OperationId,
    kind: OperationKind,
    user_id: String,
    timestamp: Timestamp,
    data: OperationData,
}

impl Operation {
    /// Build an operation with an explicit timestamp.
    pub fn new(
        kind: OperationKind,
        user_id: impl Into<String>,
        data: OperationData,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            user_id: user_id.into(),
            timestamp,
            data,
        }
    }

    /// A paint stroke.
    pub fn draw(
        user_id: impl Into<String>,
        path: Vec<Point>,
        color: PaintColor,
        brush_size: u32,
        opacity: f64,
    ) -> Self {
        let stroke = Stroke {
            path,
            color: Some(color),
            brush_size,
            opacity,
        };
        Self::new(OperationKind::Draw, user_id, OperationData::Stroke(stroke), Timestamp::now())
    }

    /// An eraser stroke.
    pub fn erase(user_id: impl Into<String>, path: Vec<Point>, brush_size: u32) -> Self {
        let stroke = Stroke {
            path,
            color: None,
            brush_size,
            opacity: 1.0,
        };
        Self::new(OperationKind::Erase, user_id, OperationData::Stroke(stroke), Timestamp::now())
    }

    /// A full canvas clear.
    pub fn clear(user_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Clear, user_id, OperationData::Empty, Timestamp::now())
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn data(&self) -> &OperationData {
        &self.data
    }

    /// The stroke payload, if this is a draw or erase.
    pub fn stroke(&self) -> Option<&Stroke> {
        match &self.data {
            OperationData::Stroke(stroke) => Some(stroke),
            OperationData::Empty => None,
        }
    }

    /// Wrap in an [`Arc`] for the history.
    pub fn into_shared(self) -> SharedOperation {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_creation_ordered() {
        let ids: Vec<OperationId> = (0..64).map(|_| OperationId::new()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_draw_payload() {
        let op = Operation::draw(
            "0xabc",
            vec![Point::new(0.0, 0.0), Point::new(4.0, 2.0)],
            PaintColor::rgb(255, 0, 0),
            8,
            0.5,
        );
        assert_eq!(op.kind(), OperationKind::Draw);
        assert_eq!(op.user_id(), "0xabc");
        let stroke = op.stroke().unwrap();
        assert_eq!(stroke.path.len(), 2);
        assert_eq!(stroke.color, Some(PaintColor::rgb(255, 0, 0)));
        assert_eq!(stroke.brush_size, 8);
    }

    #[test]
    fn test_clear_has_no_payload() {
        let op = Operation::clear("0xabc");
        assert_eq!(op.kind(), OperationKind::Clear);
        assert!(op.stroke().is_none());
    }

    #[test]
    fn test_erase_json_shape() {
        let op = Operation::erase("0xabc", vec![Point::new(1.0, 2.0)], 12);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "erase");
        assert_eq!(json["data"]["payload"], "stroke");
        assert_eq!(json["data"]["brush_size"], 12);
        assert!(json["data"].get("color").is_none());

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
