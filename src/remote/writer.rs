//! Note writer — issues remote note mutations for one room.
//!
//! DESIGN
//! ======
//! Both immediate updates and debounced flushes funnel through here so the
//! temporary-id rule lives in one place: a write aimed at a note whose create
//! has not been confirmed yet is dropped, not queued. Failures become notices;
//! local state is never rolled back and nothing is retried.

use std::sync::Arc;

use tracing::{debug, warn};

use super::NoteChannel;
use crate::error::{ErrorCode, SyncError};
use crate::note::{NoteId, NotePatch, RoomId};
use crate::notice::Notifier;

/// Outcome of a write attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Sent,
    /// The note still had a temporary id; nothing was sent.
    DroppedTemporary,
    Failed(SyncError),
}

#[derive(Clone)]
pub struct NoteWriter {
    channel: Arc<dyn NoteChannel>,
    room_id: RoomId,
    notices: Notifier,
}

impl NoteWriter {
    #[must_use]
    pub fn new(channel: Arc<dyn NoteChannel>, room_id: impl Into<RoomId>, notices: Notifier) -> Self {
        Self { channel, room_id: room_id.into(), notices }
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<dyn NoteChannel> {
        &self.channel
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn update(&self, id: &NoteId, patch: &NotePatch) -> WriteOutcome {
        let Some(remote_id) = id.remote_id() else {
            debug!(note_id = %id, "update for unconfirmed note dropped");
            return WriteOutcome::DroppedTemporary;
        };
        match self
            .channel
            .update_note(&self.room_id, remote_id, patch)
            .await
        {
            Ok(()) => WriteOutcome::Sent,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), note_id = %id, "note update failed");
                self.notices.failure("saving note", &e);
                WriteOutcome::Failed(e)
            }
        }
    }

    pub async fn delete(&self, id: &NoteId) -> WriteOutcome {
        let Some(remote_id) = id.remote_id() else {
            return WriteOutcome::DroppedTemporary;
        };
        match self.channel.delete_note(&self.room_id, remote_id).await {
            Ok(()) => WriteOutcome::Sent,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), note_id = %id, "note delete failed");
                self.notices.failure("deleting note", &e);
                WriteOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod tests;
