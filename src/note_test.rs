#![allow(clippy::float_cmp)]

use super::*;

fn text_note() -> Note {
    Note::new(NoteId::confirmed("n1"), NoteContent::Text("hello".into()), 10.0, 20.0, "alice", 1_000)
}

fn image_note() -> Note {
    Note::new(NoteId::confirmed("img"), NoteContent::Image("https://cdn/x.png".into()), 0.0, 0.0, "alice", 1_000)
}

// =============================================================
// NoteId
// =============================================================

#[test]
fn temp_ids_are_unique_and_temporary() {
    let a = NoteId::temp();
    let b = NoteId::temp();
    assert_ne!(a, b);
    assert!(a.is_temp());
    assert!(a.remote_id().is_none());
}

#[test]
fn confirmed_id_exposes_remote_id() {
    let id = NoteId::confirmed("abc123");
    assert!(!id.is_temp());
    assert_eq!(id.remote_id(), Some("abc123"));
    assert_eq!(id.to_string(), "abc123");
}

#[test]
fn temp_id_display_parses_back_to_temp() {
    let id = NoteId::temp();
    let raw = id.to_string();
    assert!(raw.starts_with("temp-"));
    assert_eq!(NoteId::from(raw), id);
}

#[test]
fn malformed_temp_prefix_is_treated_as_confirmed() {
    let id = NoteId::from("temp-not-a-uuid".to_owned());
    assert_eq!(id, NoteId::confirmed("temp-not-a-uuid"));
}

#[test]
fn note_id_serializes_as_plain_string() {
    let json = serde_json::to_string(&NoteId::confirmed("r-1")).unwrap();
    assert_eq!(json, "\"r-1\"");
}

// =============================================================
// Construction defaults
// =============================================================

#[test]
fn text_note_gets_fixed_width_and_default_height() {
    let note = text_note();
    assert_eq!(note.kind(), NoteKind::Text);
    assert_eq!(note.width, DEFAULT_NOTE_WIDTH);
    assert_eq!(note.height, Some(DEFAULT_NOTE_HEIGHT));
    assert_eq!(note.color, TEXT_NOTE_COLOR);
    assert_eq!(note.created_at, note.last_modified);
}

#[test]
fn image_note_has_no_height() {
    let note = image_note();
    assert_eq!(note.kind(), NoteKind::Image);
    assert!(note.height.is_none());
    assert_eq!(note.width, DEFAULT_IMAGE_WIDTH);
}

#[test]
fn empty_content_matches_kind() {
    for kind in [NoteKind::Text, NoteKind::Todo, NoteKind::Image] {
        assert_eq!(NoteContent::empty(kind).kind(), kind);
    }
}

// =============================================================
// apply_patch
// =============================================================

#[test]
fn apply_patch_merges_only_present_fields() {
    let mut note = text_note();
    note.apply_patch(&NotePatch::title("Groceries"), 2_000).unwrap();
    assert_eq!(note.title, "Groceries");
    assert_eq!(note.x, 10.0);
    assert_eq!(note.content, NoteContent::Text("hello".into()));
    assert_eq!(note.last_modified, 2_000);
}

#[test]
fn apply_patch_rejects_mismatched_content() {
    let mut note = text_note();
    let before = note.clone();
    let err = note
        .apply_patch(&NotePatch::content(NoteContent::Todo(vec![])), 2_000)
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(note, before);
}

#[test]
fn apply_patch_rejects_non_finite_coordinates() {
    let mut note = text_note();
    let err = note
        .apply_patch(&NotePatch::position(f64::NAN, 0.0), 2_000)
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(note.x, 10.0);
}

#[test]
fn text_height_is_clamped() {
    let mut note = text_note();
    note.apply_patch(&NotePatch { height: Some(5_000.0), ..Default::default() }, 0)
        .unwrap();
    assert_eq!(note.height, Some(MAX_NOTE_HEIGHT));
    note.apply_patch(&NotePatch { height: Some(1.0), ..Default::default() }, 0)
        .unwrap();
    assert_eq!(note.height, Some(MIN_NOTE_HEIGHT));
}

#[test]
fn image_width_is_clamped_and_height_ignored() {
    let mut note = image_note();
    note.apply_patch(&NotePatch { width: Some(50.0), height: Some(400.0), ..Default::default() }, 0)
        .unwrap();
    assert_eq!(note.width, MIN_IMAGE_WIDTH);
    assert!(note.height.is_none());
    note.apply_patch(&NotePatch { width: Some(9_999.0), ..Default::default() }, 0)
        .unwrap();
    assert_eq!(note.width, MAX_IMAGE_WIDTH);
}

// =============================================================
// duplicate
// =============================================================

#[test]
fn duplicate_offsets_position_and_resets_identity() {
    let mut original = text_note();
    original.title = "Plan".into();
    original.color = "#FF0000".into();
    let copy = original.duplicate(NoteId::temp(), "bob", 20.0, 9_000);
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.title, original.title);
    assert_eq!(copy.content, original.content);
    assert_eq!(copy.color, original.color);
    assert_eq!(copy.x, 30.0);
    assert_eq!(copy.y, 40.0);
    assert_eq!(copy.author_id, "bob");
    assert_eq!(copy.created_at, 9_000);
}

// =============================================================
// NotePatch
// =============================================================

#[test]
fn merge_keeps_latest_value_per_field() {
    let mut acc = NotePatch::title("a");
    acc.merge(NotePatch::color("#000"));
    acc.merge(NotePatch::title("abc"));
    assert_eq!(acc.title.as_deref(), Some("abc"));
    assert_eq!(acc.color.as_deref(), Some("#000"));
    assert!(acc.x.is_none());
}

#[test]
fn clear_fields_of_removes_overridden_fields() {
    let mut pending = NotePatch::position(1.0, 2.0);
    pending.merge(NotePatch::title("draft"));

    pending.clear_fields_of(&NotePatch::position(9.0, 9.0));

    assert_eq!(pending, NotePatch::title("draft"));
}

#[test]
fn default_patch_is_empty() {
    assert!(NotePatch::default().is_empty());
    assert!(!NotePatch::title("").is_empty());
}

#[test]
fn patch_serialization_skips_absent_fields() {
    let json = serde_json::to_value(NotePatch::position(1.0, 2.0)).unwrap();
    assert_eq!(json, serde_json::json!({"x": 1.0, "y": 2.0}));
}

// =============================================================
// Todo helpers
// =============================================================

#[test]
fn todo_add_toggle_edit_remove() {
    let content = NoteContent::Todo(vec![]);
    let content = content.add_todo("milk").unwrap();
    let NoteContent::Todo(items) = &content else {
        panic!("expected todo content");
    };
    let item_id = items[0].id.clone();
    assert!(!items[0].completed);

    let content = content.toggle_todo(&item_id).unwrap();
    let content = content.edit_todo(&item_id, "oat milk").unwrap();
    let NoteContent::Todo(items) = &content else {
        panic!("expected todo content");
    };
    assert!(items[0].completed);
    assert_eq!(items[0].text, "oat milk");

    let content = content.remove_todo(&item_id).unwrap();
    assert_eq!(content, NoteContent::Todo(vec![]));
}

#[test]
fn todo_helpers_reject_other_kinds() {
    let content = NoteContent::Text("x".into());
    assert!(matches!(content.add_todo("y"), Err(SyncError::Validation(_))));
}

#[test]
fn todo_helpers_report_unknown_items() {
    let content = NoteContent::Todo(vec![TodoItem::new("a")]);
    assert!(matches!(content.toggle_todo("missing"), Err(SyncError::NotFound { .. })));
    assert!(matches!(content.remove_todo("missing"), Err(SyncError::NotFound { .. })));
}

#[test]
fn todo_order_is_preserved_on_remove() {
    let a = TodoItem::new("a");
    let b = TodoItem::new("b");
    let c = TodoItem::new("c");
    let content = NoteContent::Todo(vec![a.clone(), b.clone(), c.clone()]);
    let content = content.remove_todo(&b.id).unwrap();
    assert_eq!(content, NoteContent::Todo(vec![a, c]));
}

#[test]
fn note_json_round_trip_preserves_content_variant() {
    let mut note = text_note();
    note.content = NoteContent::Todo(vec![TodoItem::new("x")]);
    let json = serde_json::to_string(&note).unwrap();
    let back: Note = serde_json::from_str(&json).unwrap();
    assert_eq!(back, note);
}
