//! Camera transform between screen pixels and canvas coordinates.
//!
//! Notes are positioned in canvas space. Pointer events arrive in screen
//! space. Every pointer delta is divided by the zoom before it touches a note,
//! so a 100px drag at zoom 2 moves the note 50 canvas units.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 4.0;

/// A point in either screen or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise `self - origin`.
    #[must_use]
    pub fn delta_from(self, origin: Point) -> Point {
        Point { x: self.x - origin.x, y: self.y - origin.y }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Pan and zoom of the canvas viewport.
///
/// `pan_x` / `pan_y` are in screen pixels.
/// `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Camera with the zoom clamped to `[MIN_ZOOM, MAX_ZOOM]`. A non-finite
    /// zoom falls back to 1.0.
    #[must_use]
    pub fn new(pan_x: f64, pan_y: f64, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { 1.0 };
        Self { pan_x, pan_y, zoom }
    }

    /// Same camera with the zoom clamped, for values built field by field.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.pan_x, self.pan_y, self.zoom)
    }

    /// Screen-space displacement to canvas-space displacement. Pan cancels out.
    #[must_use]
    pub fn delta_to_canvas(&self, screen_delta: Point) -> Point {
        Point { x: screen_delta.x / self.zoom, y: screen_delta.y / self.zoom }
    }
}
