#![allow(clippy::float_cmp)]

use super::*;
use crate::note::{NoteContent, NoteKind};

fn note_at(kind: NoteKind, x: f64, y: f64) -> Note {
    Note::new(NoteId::confirmed("n1"), NoteContent::empty(kind), x, y, "alice", 0)
}

fn engine(zoom: f64) -> GestureEngine {
    GestureEngine::new(Camera::new(0.0, 0.0, zoom))
}

// =============================================================
// Drag
// =============================================================

#[test]
fn drag_at_zoom_two_moves_half_the_pixels() {
    let note = note_at(NoteKind::Text, 500.0, 300.0);
    let mut gestures = engine(2.0);

    gestures.begin_drag(&note, Point::new(1000.0, 600.0)).unwrap();
    let preview = gestures.pointer_move(Point::new(1100.0, 600.0));
    assert_eq!(preview, GesturePreview::Offset { id: note.id.clone(), dx: 50.0, dy: 0.0 });

    let commit = gestures.finish(Point::new(1100.0, 600.0)).unwrap();
    assert_eq!(commit.id, note.id);
    assert_eq!(commit.patch, NotePatch::position(550.0, 300.0));
    assert!(gestures.active_note().is_none());
}

#[test]
fn zero_net_drag_commits_original_position() {
    let note = note_at(NoteKind::Todo, 12.345, 67.891);
    let mut gestures = engine(1.7);

    gestures.begin_drag(&note, Point::new(10.0, 10.0)).unwrap();
    gestures.pointer_move(Point::new(10.1, 10.2));
    gestures.pointer_move(Point::new(47.3, -3.9));
    let commit = gestures.finish(Point::new(10.0, 10.0)).unwrap();

    assert_eq!(commit.patch, NotePatch::position(12.345, 67.891));
}

#[test]
fn zoom_change_mid_drag_does_not_rescale() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(2.0);

    gestures.begin_drag(&note, Point::new(0.0, 0.0)).unwrap();
    gestures.set_camera(Camera::new(0.0, 0.0, 1.0));
    let commit = gestures.finish(Point::new(100.0, 40.0)).unwrap();

    assert_eq!(commit.patch, NotePatch::position(50.0, 20.0));
}

#[test]
fn hand_built_zero_zoom_camera_is_clamped() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(1.0);
    gestures.set_camera(Camera { pan_x: 0.0, pan_y: 0.0, zoom: 0.0 });
    assert_eq!(gestures.camera().zoom, camera::MIN_ZOOM);

    gestures.begin_drag(&note, Point::new(0.0, 0.0)).unwrap();
    let commit = gestures.finish(Point::new(1.0, 2.0)).unwrap();

    assert_eq!(commit.patch, NotePatch::position(10.0, 20.0));
}

#[test]
fn non_finite_move_is_ignored() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(1.0);
    gestures.begin_drag(&note, Point::new(0.0, 0.0)).unwrap();
    gestures.pointer_move(Point::new(30.0, 0.0));

    assert_eq!(gestures.pointer_move(Point::new(f64::NAN, 0.0)), GesturePreview::None);
    let commit = gestures.finish(Point::new(f64::INFINITY, 0.0)).unwrap();
    assert_eq!(commit.patch, NotePatch::position(30.0, 0.0));
}

// =============================================================
// Resize
// =============================================================

#[test]
fn image_resize_never_sets_height() {
    let note = note_at(NoteKind::Image, 0.0, 0.0);
    let mut gestures = engine(1.0);

    gestures.begin_resize(&note, Point::new(0.0, 0.0)).unwrap();
    let commit = gestures.finish(Point::new(40.0, 90.0)).unwrap();

    assert_eq!(commit.patch.width, Some(390.0));
    assert_eq!(commit.patch.height, None);
    assert_eq!(commit.patch.x, None);
}

#[test]
fn text_resize_never_sets_width() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(0.5);

    gestures.begin_resize(&note, Point::new(0.0, 0.0)).unwrap();
    let commit = gestures.finish(Point::new(300.0, 50.0)).unwrap();

    assert_eq!(commit.patch.width, None);
    assert_eq!(commit.patch.height, Some(300.0));
}

// =============================================================
// Lifecycle
// =============================================================

#[test]
fn one_gesture_at_a_time() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(1.0);
    gestures.begin_drag(&note, Point::default()).unwrap();

    let err = gestures.begin_resize(&note, Point::default()).unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

#[test]
fn non_finite_start_is_rejected() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(1.0);
    assert!(gestures.begin_drag(&note, Point::new(f64::NAN, 0.0)).is_err());
    assert!(gestures.state().is_idle());
}

#[test]
fn cancel_returns_the_note_and_commits_nothing() {
    let note = note_at(NoteKind::Text, 0.0, 0.0);
    let mut gestures = engine(1.0);
    gestures.begin_drag(&note, Point::default()).unwrap();

    assert_eq!(gestures.cancel(), Some(note.id.clone()));
    assert!(gestures.finish(Point::new(5.0, 5.0)).is_none());
}

#[test]
fn finish_without_gesture_is_none() {
    assert!(engine(1.0).finish(Point::default()).is_none());
}
