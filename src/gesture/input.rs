//! Gesture state: what is being dragged or resized, and the live preview.
//!
//! `GestureState` carries everything captured at pointer-down that the engine
//! needs to compute previews during the gesture and the final patch on
//! release. Nothing here talks to the store or the remote channel.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use super::camera::{Camera, Point};
use crate::consts::DEFAULT_NOTE_HEIGHT;
use crate::note::{NoteId, NoteKind, NotePatch, clamp_height, clamp_width};

/// How a resize maps pointer movement onto note size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Width follows whichever axis moved further; height is implied by the
    /// image aspect ratio and never persisted.
    DominantAxisWidth,
    /// Height follows vertical movement only; width never changes.
    VerticalHeight,
}

impl ResizePolicy {
    #[must_use]
    pub fn for_kind(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Image => Self::DominantAxisWidth,
            NoteKind::Text | NoteKind::Todo => Self::VerticalHeight,
        }
    }
}

/// Active gesture, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GestureState {
    #[default]
    Idle,
    /// Moving a note. Its stored position stays frozen until release.
    Dragging {
        id: NoteId,
        start_screen: Point,
        /// Camera captured at pointer-down.
        camera: Camera,
        orig_x: f64,
        orig_y: f64,
        /// Transient canvas-space offset shown while dragging.
        offset: Point,
    },
    Resizing {
        id: NoteId,
        kind: NoteKind,
        start_screen: Point,
        camera: Camera,
        orig_width: f64,
        orig_height: Option<f64>,
        width: f64,
        height: Option<f64>,
    },
}

impl GestureState {
    #[must_use]
    pub fn note_id(&self) -> Option<&NoteId> {
        match self {
            Self::Idle => None,
            Self::Dragging { id, .. } | Self::Resizing { id, .. } => Some(id),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Feed a pointer position and return the preview to render.
    pub fn track(&mut self, screen: Point) -> GesturePreview {
        match self {
            Self::Idle => GesturePreview::None,
            Self::Dragging { id, start_screen, camera, offset, .. } => {
                *offset = camera.delta_to_canvas(screen.delta_from(*start_screen));
                GesturePreview::Offset { id: id.clone(), dx: offset.x, dy: offset.y }
            }
            Self::Resizing { id, kind, start_screen, camera, orig_width, orig_height, width, height } => {
                let moved = camera.delta_to_canvas(screen.delta_from(*start_screen));
                match ResizePolicy::for_kind(*kind) {
                    ResizePolicy::DominantAxisWidth => {
                        let dominant = if moved.x.abs() >= moved.y.abs() { moved.x } else { moved.y };
                        *width = clamp_width(*kind, *orig_width + dominant);
                    }
                    ResizePolicy::VerticalHeight => {
                        let base = orig_height.unwrap_or(DEFAULT_NOTE_HEIGHT);
                        *height = clamp_height(*kind, base + moved.y);
                    }
                }
                GesturePreview::Size { id: id.clone(), width: *width, height: *height }
            }
        }
    }

    /// The patch to commit on release.
    #[must_use]
    pub fn commit_patch(&self) -> Option<NotePatch> {
        match self {
            Self::Idle => None,
            Self::Dragging { orig_x, orig_y, offset, .. } => {
                Some(NotePatch::position(orig_x + offset.x, orig_y + offset.y))
            }
            Self::Resizing { kind, width, height, .. } => Some(match ResizePolicy::for_kind(*kind) {
                ResizePolicy::DominantAxisWidth => NotePatch { width: Some(*width), ..NotePatch::default() },
                ResizePolicy::VerticalHeight => NotePatch { height: *height, ..NotePatch::default() },
            }),
        }
    }

    /// Point the gesture at a new id (temporary id confirmed mid-gesture).
    pub fn rekey(&mut self, from: &NoteId, to: &NoteId) {
        match self {
            Self::Dragging { id, .. } | Self::Resizing { id, .. } if *id == *from => *id = to.clone(),
            _ => {}
        }
    }
}

/// Transient visual feedback for the note under a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum GesturePreview {
    None,
    /// Render the note shifted by this canvas-space offset.
    Offset { id: NoteId, dx: f64, dy: f64 },
    /// Render the note at this size.
    Size { id: NoteId, width: f64, height: Option<f64> },
}
