//! Drag & resize gesture engine.
//!
//! DESIGN
//! ======
//! A gesture never writes mid-flight. Pointer-down freezes the note's
//! geometry, pointer moves only produce a transient `GesturePreview`, and
//! pointer-up yields a single `GestureCommit` that the room applies through
//! its normal update path. One gesture at a time per session.
//!
//! Pointer deltas are measured from the pointer-down position and mapped to
//! canvas space through the camera captured at pointer-down. Summing per-move deltas telescopes to
//! the same value, and a gesture whose pointer returns to its start commits
//! exactly the original geometry.

pub mod camera;
pub mod input;

#[cfg(test)]
#[path = "gesture_test.rs"]
mod gesture_test;

use tracing::debug;

pub use camera::{Camera, Point};
pub use input::{GesturePreview, GestureState, ResizePolicy};

use crate::error::SyncError;
use crate::note::{Note, NoteId, NotePatch};

/// What a finished gesture wants written.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureCommit {
    pub id: NoteId,
    pub patch: NotePatch,
}

/// Per-session gesture tracker.
#[derive(Debug, Default)]
pub struct GestureEngine {
    camera: Camera,
    state: GestureState,
}

impl GestureEngine {
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self { camera: camera.clamped(), state: GestureState::Idle }
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// Replace the camera, re-clamping its zoom. A gesture in progress keeps
    /// the camera it started with.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera.clamped();
    }

    #[must_use]
    pub fn state(&self) -> &GestureState {
        &self.state
    }

    #[must_use]
    pub fn active_note(&self) -> Option<&NoteId> {
        self.state.note_id()
    }

    /// Start moving `note` from the given screen position.
    ///
    /// # Errors
    ///
    /// `Validation` if a gesture is already active or the point is not finite.
    pub fn begin_drag(&mut self, note: &Note, screen: Point) -> Result<(), SyncError> {
        self.ensure_idle(screen)?;
        self.state = GestureState::Dragging {
            id: note.id.clone(),
            start_screen: screen,
            camera: self.camera,
            orig_x: note.x,
            orig_y: note.y,
            offset: Point::default(),
        };
        debug!(note_id = %note.id, "drag started");
        Ok(())
    }

    /// Start resizing `note` from the given screen position.
    ///
    /// # Errors
    ///
    /// `Validation` if a gesture is already active or the point is not finite.
    pub fn begin_resize(&mut self, note: &Note, screen: Point) -> Result<(), SyncError> {
        self.ensure_idle(screen)?;
        self.state = GestureState::Resizing {
            id: note.id.clone(),
            kind: note.kind(),
            start_screen: screen,
            camera: self.camera,
            orig_width: note.width,
            orig_height: note.height,
            width: note.width,
            height: note.height,
        };
        debug!(note_id = %note.id, kind = ?note.kind(), "resize started");
        Ok(())
    }

    fn ensure_idle(&self, screen: Point) -> Result<(), SyncError> {
        if let Some(id) = self.state.note_id() {
            return Err(SyncError::Validation(format!("gesture already in progress on {id}")));
        }
        if !screen.is_finite() {
            return Err(SyncError::Validation("pointer position must be finite".into()));
        }
        Ok(())
    }

    /// Track the pointer. Non-finite positions are ignored.
    pub fn pointer_move(&mut self, screen: Point) -> GesturePreview {
        if !screen.is_finite() {
            return GesturePreview::None;
        }
        self.state.track(screen)
    }

    /// Release the pointer at `screen` and take the final patch.
    pub fn finish(&mut self, screen: Point) -> Option<GestureCommit> {
        if screen.is_finite() {
            self.state.track(screen);
        }
        let state = std::mem::take(&mut self.state);
        let id = state.note_id()?.clone();
        let patch = state.commit_patch()?;
        debug!(note_id = %id, "gesture finished");
        Some(GestureCommit { id, patch })
    }

    /// Abandon the gesture without committing.
    pub fn cancel(&mut self) -> Option<NoteId> {
        std::mem::take(&mut self.state).note_id().cloned()
    }

    pub fn rekey(&mut self, from: &NoteId, to: &NoteId) {
        self.state.rekey(from, to);
    }
}
