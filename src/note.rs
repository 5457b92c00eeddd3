//! Note model: identifiers, the tagged content union, and sparse patches.
//!
//! This module defines what lives on the canvas (`Note`), the kind-specific
//! payload (`NoteContent`), the sparse-update type used for both local edits
//! and remote writes (`NotePatch`), and the identifier that distinguishes a
//! note still awaiting remote confirmation from one the remote store has
//! accepted (`NoteId`).
//!
//! Size clamps are enforced here so every writer (gestures, field edits,
//! remote pushes) observes the same geometry invariants.

#[cfg(test)]
#[path = "note_test.rs"]
mod note_test;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{
    DEFAULT_IMAGE_WIDTH, DEFAULT_NOTE_HEIGHT, DEFAULT_NOTE_WIDTH, IMAGE_NOTE_COLOR, MAX_IMAGE_WIDTH, MAX_NOTE_HEIGHT,
    MIN_IMAGE_WIDTH, MIN_NOTE_HEIGHT, TEXT_NOTE_COLOR, TODO_NOTE_COLOR,
};
use crate::error::SyncError;

/// Identifier of a user as issued by the auth collaborator.
pub type UserId = String;

/// Identifier of a room.
pub type RoomId = String;

const TEMP_PREFIX: &str = "temp-";

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a note, either synthesized locally or assigned remotely.
///
/// A `Temp` id exists only between the optimistic insert and the remote
/// create's reply. On success it is rewritten to `Confirmed` everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteId {
    Temp(Uuid),
    Confirmed(String),
}

impl NoteId {
    /// Synthesize a fresh temporary id.
    #[must_use]
    pub fn temp() -> Self {
        Self::Temp(Uuid::new_v4())
    }

    #[must_use]
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(id.into())
    }

    #[must_use]
    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// The remote id, if the note has been confirmed.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Temp(_) => None,
            Self::Confirmed(id) => Some(id),
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temp(uuid) => write!(f, "{TEMP_PREFIX}{uuid}"),
            Self::Confirmed(id) => f.write_str(id),
        }
    }
}

impl From<String> for NoteId {
    fn from(raw: String) -> Self {
        if let Some(rest) = raw.strip_prefix(TEMP_PREFIX)
            && let Ok(uuid) = Uuid::parse_str(rest)
        {
            return Self::Temp(uuid);
        }
        Self::Confirmed(raw)
    }
}

impl From<NoteId> for String {
    fn from(id: NoteId) -> Self {
        id.to_string()
    }
}

// =============================================================================
// CONTENT
// =============================================================================

/// The kind of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Free-form text.
    Text,
    /// Ordered checklist.
    Todo,
    /// Image referenced by URL; height follows the aspect ratio.
    Image,
}

impl NoteKind {
    /// Default background color for a freshly created note of this kind.
    #[must_use]
    pub fn default_color(self) -> &'static str {
        match self {
            Self::Text => TEXT_NOTE_COLOR,
            Self::Todo => TODO_NOTE_COLOR,
            Self::Image => IMAGE_NOTE_COLOR,
        }
    }
}

/// One entry of a todo note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl TodoItem {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4().to_string(), text: text.into(), completed: false }
    }
}

/// Kind-specific note payload. The variant *is* the note's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NoteContent {
    Text(String),
    Todo(Vec<TodoItem>),
    /// Public URL of the uploaded image.
    Image(String),
}

impl NoteContent {
    /// Empty content for a kind.
    #[must_use]
    pub fn empty(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Text => Self::Text(String::new()),
            NoteKind::Todo => Self::Todo(Vec::new()),
            NoteKind::Image => Self::Image(String::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NoteKind {
        match self {
            Self::Text(_) => NoteKind::Text,
            Self::Todo(_) => NoteKind::Todo,
            Self::Image(_) => NoteKind::Image,
        }
    }

    /// Append a new unchecked item.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if this is not todo content.
    pub fn add_todo(&self, text: impl Into<String>) -> Result<Self, SyncError> {
        let mut items = self.todo_items()?.to_vec();
        items.push(TodoItem::new(text));
        Ok(Self::Todo(items))
    }

    /// Flip the `completed` flag of one item.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for non-todo content, `NotFound` for an unknown item.
    pub fn toggle_todo(&self, item_id: &str) -> Result<Self, SyncError> {
        self.map_todo(item_id, |item| item.completed = !item.completed)
    }

    /// Replace the text of one item.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for non-todo content, `NotFound` for an unknown item.
    pub fn edit_todo(&self, item_id: &str, text: impl Into<String>) -> Result<Self, SyncError> {
        let text = text.into();
        self.map_todo(item_id, move |item| item.text = text)
    }

    /// Drop one item, keeping the order of the rest.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for non-todo content, `NotFound` for an unknown item.
    pub fn remove_todo(&self, item_id: &str) -> Result<Self, SyncError> {
        let items = self.todo_items()?;
        if !items.iter().any(|item| item.id == item_id) {
            return Err(SyncError::not_found("todo item", item_id));
        }
        Ok(Self::Todo(items.iter().filter(|item| item.id != item_id).cloned().collect()))
    }

    fn todo_items(&self) -> Result<&[TodoItem], SyncError> {
        match self {
            Self::Todo(items) => Ok(items),
            other => Err(SyncError::Validation(format!("{:?} note has no todo items", other.kind()))),
        }
    }

    fn map_todo(&self, item_id: &str, f: impl FnOnce(&mut TodoItem)) -> Result<Self, SyncError> {
        let mut items = self.todo_items()?.to_vec();
        let Some(item) = items.iter_mut().find(|item| item.id == item_id) else {
            return Err(SyncError::not_found("todo item", item_id));
        };
        f(item);
        Ok(Self::Todo(items))
    }
}

// =============================================================================
// NOTE
// =============================================================================

/// A note as held in the local store and sent to the remote channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: NoteContent,
    /// Left edge in canvas coordinates.
    pub x: f64,
    /// Top edge in canvas coordinates.
    pub y: f64,
    pub width: f64,
    /// `None` for image notes; their height follows the image aspect ratio.
    pub height: Option<f64>,
    pub color: String,
    pub author_id: UserId,
    /// Milliseconds since Unix epoch.
    pub created_at: i64,
    /// Milliseconds since Unix epoch.
    pub last_modified: i64,
}

impl Note {
    /// Build a note with the default geometry and color for its kind.
    #[must_use]
    pub fn new(id: NoteId, content: NoteContent, x: f64, y: f64, author_id: impl Into<UserId>, now: i64) -> Self {
        let kind = content.kind();
        let (width, height) = match kind {
            NoteKind::Image => (DEFAULT_IMAGE_WIDTH, None),
            NoteKind::Text | NoteKind::Todo => (DEFAULT_NOTE_WIDTH, Some(DEFAULT_NOTE_HEIGHT)),
        };
        Self {
            id,
            title: String::new(),
            content,
            x,
            y,
            width,
            height,
            color: kind.default_color().to_owned(),
            author_id: author_id.into(),
            created_at: now,
            last_modified: now,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NoteKind {
        self.content.kind()
    }

    /// Clone everything but identity and timestamps, shifted by `offset` on both axes.
    #[must_use]
    pub fn duplicate(&self, id: NoteId, author_id: impl Into<UserId>, offset: f64, now: i64) -> Self {
        Self {
            id,
            title: self.title.clone(),
            content: self.content.clone(),
            x: self.x + offset,
            y: self.y + offset,
            width: self.width,
            height: self.height,
            color: self.color.clone(),
            author_id: author_id.into(),
            created_at: now,
            last_modified: now,
        }
    }

    /// Merge a patch into this note. Nothing is applied if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the patch content kind differs from the note's
    /// kind or a coordinate is not finite.
    pub fn apply_patch(&mut self, patch: &NotePatch, now: i64) -> Result<(), SyncError> {
        patch.validate_for(self.kind())?;

        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.width {
            self.width = clamp_width(self.kind(), w);
        }
        if let Some(h) = patch.height {
            self.height = clamp_height(self.kind(), h);
        }
        if let Some(color) = &patch.color {
            self.color.clone_from(color);
        }
        self.last_modified = now;
        Ok(())
    }

    /// Copy geometry (position and size) from another version of this note.
    pub fn keep_geometry_of(&mut self, other: &Note) {
        self.x = other.x;
        self.y = other.y;
        self.width = other.width;
        self.height = other.height;
    }
}

/// Image widths are clamped; other kinds keep their width as given.
#[must_use]
pub fn clamp_width(kind: NoteKind, width: f64) -> f64 {
    match kind {
        NoteKind::Image => width.clamp(MIN_IMAGE_WIDTH, MAX_IMAGE_WIDTH),
        NoteKind::Text | NoteKind::Todo => width,
    }
}

/// Text and todo heights are clamped; image notes never persist a height.
#[must_use]
pub fn clamp_height(kind: NoteKind, height: f64) -> Option<f64> {
    match kind {
        NoteKind::Image => None,
        NoteKind::Text | NoteKind::Todo => Some(height.clamp(MIN_NOTE_HEIGHT, MAX_NOTE_HEIGHT)),
    }
}

// =============================================================================
// PATCH
// =============================================================================

/// Sparse update for a note. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<NoteContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NotePatch {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    #[must_use]
    pub fn content(content: NoteContent) -> Self {
        Self { content: Some(content), ..Self::default() }
    }

    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    #[must_use]
    pub fn color(color: impl Into<String>) -> Self {
        Self { color: Some(color.into()), ..Self::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a later patch into this one. Fields present in `later` win.
    pub fn merge(&mut self, later: NotePatch) {
        if later.title.is_some() {
            self.title = later.title;
        }
        if later.content.is_some() {
            self.content = later.content;
        }
        if later.x.is_some() {
            self.x = later.x;
        }
        if later.y.is_some() {
            self.y = later.y;
        }
        if later.width.is_some() {
            self.width = later.width;
        }
        if later.height.is_some() {
            self.height = later.height;
        }
        if later.color.is_some() {
            self.color = later.color;
        }
    }

    /// Drop every field that `newer` sets.
    pub fn clear_fields_of(&mut self, newer: &NotePatch) {
        if newer.title.is_some() {
            self.title = None;
        }
        if newer.content.is_some() {
            self.content = None;
        }
        if newer.x.is_some() {
            self.x = None;
        }
        if newer.y.is_some() {
            self.y = None;
        }
        if newer.width.is_some() {
            self.width = None;
        }
        if newer.height.is_some() {
            self.height = None;
        }
        if newer.color.is_some() {
            self.color = None;
        }
    }

    /// Check the patch against the kind of the note it targets.
    ///
    /// # Errors
    ///
    /// Returns `Validation` on a content/kind mismatch or a non-finite number.
    pub fn validate_for(&self, kind: NoteKind) -> Result<(), SyncError> {
        if let Some(content) = &self.content
            && content.kind() != kind
        {
            return Err(SyncError::Validation(format!(
                "{:?} content does not match {kind:?} note",
                content.kind()
            )));
        }
        let numbers = [("x", self.x), ("y", self.y), ("width", self.width), ("height", self.height)];
        for (field, value) in numbers {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(SyncError::Validation(format!("{field} must be finite, got {v}")));
            }
        }
        Ok(())
    }
}
