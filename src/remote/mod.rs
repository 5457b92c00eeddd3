//! Remote sync channel — the boundary to the multi-writer note store.
//!
//! ARCHITECTURE
//! ============
//! The engine talks to persistence and fan-out only through these traits.
//! Subscriptions push complete snapshots (never diffs) in the order the
//! remote produced them; a channel-level failure is delivered in-band as an
//! `Err` item so the consumer can degrade instead of tearing down.
//!
//! Writes are last-write-wins per field with no version check. Nothing here
//! retries; callers decide what to surface.

pub mod memory;
pub mod writer;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::note::{Note, NotePatch};
use crate::presence::PresenceRecord;

pub use memory::InMemoryRemote;
pub use writer::NoteWriter;

/// Push stream of full snapshots for one room.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, SyncError>>,
}

impl<T> Subscription<T> {
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<Result<T, SyncError>>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot. `None` once the remote closes the stream.
    pub async fn next(&mut self) -> Option<Result<T, SyncError>> {
        self.rx.recv().await
    }
}

/// Note persistence and push updates.
#[async_trait]
pub trait NoteChannel: Send + Sync {
    async fn subscribe_notes(&self, room_id: &str) -> Result<Subscription<Vec<Note>>, SyncError>;

    /// Persist a new note and return the remote-assigned id. The note's own
    /// `id` is ignored.
    async fn create_note(&self, room_id: &str, note: &Note) -> Result<String, SyncError>;

    async fn update_note(&self, room_id: &str, note_id: &str, patch: &NotePatch) -> Result<(), SyncError>;

    async fn delete_note(&self, room_id: &str, note_id: &str) -> Result<(), SyncError>;
}

/// Presence entries and typing flags.
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    async fn subscribe_presence(&self, room_id: &str) -> Result<Subscription<Vec<PresenceRecord>>, SyncError>;

    async fn join_presence(&self, room_id: &str, user_id: &str) -> Result<(), SyncError>;

    async fn leave_presence(&self, room_id: &str, user_id: &str) -> Result<(), SyncError>;

    async fn set_typing(&self, room_id: &str, user_id: &str, is_writing: bool) -> Result<(), SyncError>;
}
