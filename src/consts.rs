//! Shared numeric constants for note geometry.

// ── Image notes ─────────────────────────────────────────────────

/// Smallest width an image note may be resized to, in canvas units.
pub const MIN_IMAGE_WIDTH: f64 = 100.0;

/// Largest width an image note may be resized to, in canvas units.
pub const MAX_IMAGE_WIDTH: f64 = 1200.0;

/// Width given to a freshly created image note.
pub const DEFAULT_IMAGE_WIDTH: f64 = 300.0;

// ── Text / todo notes ───────────────────────────────────────────

/// Smallest height a text or todo note may be resized to.
pub const MIN_NOTE_HEIGHT: f64 = 140.0;

/// Largest height a text or todo note may be resized to.
pub const MAX_NOTE_HEIGHT: f64 = 600.0;

/// Height given to a freshly created text or todo note.
pub const DEFAULT_NOTE_HEIGHT: f64 = 200.0;

/// Fixed width of text and todo notes.
pub const DEFAULT_NOTE_WIDTH: f64 = 256.0;

// ── Colors ──────────────────────────────────────────────────────

/// Default background for text notes.
pub const TEXT_NOTE_COLOR: &str = "#FFEB3B";

/// Default background for todo notes.
pub const TODO_NOTE_COLOR: &str = "#90CAF9";

/// Default background for image notes.
pub const IMAGE_NOTE_COLOR: &str = "#FFFFFF";
