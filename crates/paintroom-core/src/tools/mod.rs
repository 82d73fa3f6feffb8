//! Drawing tools and brush settings.

use crate::color::PaintColor;
use crate::operation::Operation;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Smallest movement, in canvas pixels, recorded as a new stroke point.
const MIN_POINT_DISTANCE: f64 = 1.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
}

/// Inclusive brush size range enforced by the settings setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrushBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for BrushBounds {
    fn default() -> Self {
        Self { min: 1, max: 50 }
    }
}

impl BrushBounds {
    /// Clamp `size` into range. Inverted bounds collapse to `min`.
    pub fn clamp(&self, size: u32) -> u32 {
        size.min(self.max).max(self.min)
    }
}

fn default_brush_size() -> u32 {
    5
}

fn default_brush_opacity() -> f64 {
    1.0
}

/// User tool preferences. Persisted across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default)]
    selected_tool: ToolKind,
    #[serde(default = "default_brush_size")]
    brush_size: u32,
    #[serde(default = "default_brush_opacity")]
    brush_opacity: f64,
    #[serde(skip)]
    bounds: BrushBounds,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::with_bounds(BrushBounds::default())
    }
}

impl ToolSettings {
    pub fn with_bounds(bounds: BrushBounds) -> Self {
        Self {
            selected_tool: ToolKind::default(),
            brush_size: bounds.clamp(default_brush_size()),
            brush_opacity: default_brush_opacity(),
            bounds,
        }
    }

    pub fn selected_tool(&self) -> ToolKind {
        self.selected_tool
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn brush_opacity(&self) -> f64 {
        self.brush_opacity
    }

    pub fn bounds(&self) -> BrushBounds {
        self.bounds
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.selected_tool = tool;
    }

    /// Switch between brush and eraser.
    pub fn toggle_tool(&mut self) {
        self.selected_tool = match self.selected_tool {
            ToolKind::Brush => ToolKind::Eraser,
            ToolKind::Eraser => ToolKind::Brush,
        };
    }

    /// Set the brush size, clamped to the configured bounds.
    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = self.bounds.clamp(size);
    }

    /// Set the opacity, clamped to `[0, 1]`. NaN is ignored.
    pub fn set_brush_opacity(&mut self, opacity: f64) {
        if !opacity.is_nan() {
            self.brush_opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Replace the bounds and re-clamp the current size.
    pub fn set_bounds(&mut self, bounds: BrushBounds) {
        self.bounds = bounds;
        self.brush_size = bounds.clamp(self.brush_size);
    }

    /// Re-apply all invariants, e.g. after deserializing stored values.
    pub(crate) fn normalized(mut self, bounds: BrushBounds) -> Self {
        self.set_bounds(bounds);
        if self.brush_opacity.is_nan() {
            self.brush_opacity = default_brush_opacity();
        }
        self.brush_opacity = self.brush_opacity.clamp(0.0, 1.0);
        self
    }
}

/// Accumulates one pointer interaction into a stroke.
#[derive(Debug, Clone, Default)]
pub struct StrokeRecorder {
    points: Vec<Point>,
    active: bool,
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer down.
    pub fn begin(&mut self, point: Point) {
        self.points.clear();
        self.points.push(point);
        self.active = true;
    }

    /// Pointer move. Points closer than a pixel to the last one are skipped.
    pub fn update(&mut self, point: Point) {
        if !self.active {
            return;
        }
        let far_enough = self
            .points
            .last()
            .is_none_or(|last| last.distance(point) >= MIN_POINT_DISTANCE);
        if far_enough {
            self.points.push(point);
        }
    }

    /// Pointer up. Builds the operation for the current tool, or `None` if no
    /// stroke was in progress.
    pub fn end(
        &mut self,
        user_id: &str,
        settings: &ToolSettings,
        color: PaintColor,
    ) -> Option<Operation> {
        if !self.active {
            return None;
        }
        self.active = false;
        let path = std::mem::take(&mut self.points);

        let op = match settings.selected_tool() {
            ToolKind::Brush => Operation::draw(
                user_id,
                path,
                color,
                settings.brush_size(),
                settings.brush_opacity(),
            ),
            ToolKind::Eraser => Operation::erase(user_id, path, settings.brush_size()),
        };
        Some(op)
    }

    /// Abandon the current stroke.
    pub fn cancel(&mut self) {
        self.points.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Points recorded so far, for live preview.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
