//! In-memory remote — a multi-writer reference backend.
//!
//! DESIGN
//! ======
//! Each room keeps its notes, presence entries and subscriber senders in one
//! map behind a mutex. Every successful mutation re-broadcasts the full
//! snapshot to every subscriber of that room, mirroring a document store's
//! snapshot listeners. Writes are last-write-wins with no version check.
//!
//! Deletes are idempotent; updates against a missing note or presence entry
//! fail with `NotFound`, the way a concurrent deletion surfaces remotely.
//!
//! TESTING
//! =======
//! `fail_next` arms one-shot network failures per operation, `set_latency`
//! delays every call, and `calls` exposes a log of accepted mutations so
//! debounce behavior can be asserted by counting writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{NoteChannel, PresenceChannel, Subscription};
use crate::error::SyncError;
use crate::note::{Note, NoteId, NotePatch, RoomId, UserId, now_ms};
use crate::presence::PresenceRecord;

type NoteSender = mpsc::UnboundedSender<Result<Vec<Note>, SyncError>>;
type PresenceSender = mpsc::UnboundedSender<Result<Vec<PresenceRecord>, SyncError>>;

// =============================================================================
// TYPES
// =============================================================================

/// Remote operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    SubscribeNotes,
    CreateNote,
    UpdateNote,
    DeleteNote,
    SubscribePresence,
    JoinPresence,
    LeavePresence,
    SetTyping,
}

impl RemoteOp {
    fn name(self) -> &'static str {
        match self {
            Self::SubscribeNotes => "subscribe notes",
            Self::CreateNote => "create note",
            Self::UpdateNote => "update note",
            Self::DeleteNote => "delete note",
            Self::SubscribePresence => "subscribe presence",
            Self::JoinPresence => "join presence",
            Self::LeavePresence => "leave presence",
            Self::SetTyping => "set typing",
        }
    }
}

/// A mutation the remote accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    CreateNote { room_id: RoomId, note_id: String },
    UpdateNote { room_id: RoomId, note_id: String, patch: NotePatch },
    DeleteNote { room_id: RoomId, note_id: String },
    JoinPresence { room_id: RoomId, user_id: UserId },
    LeavePresence { room_id: RoomId, user_id: UserId },
    SetTyping { room_id: RoomId, user_id: UserId, is_writing: bool },
}

/// Live state of one room.
#[derive(Default)]
struct RoomState {
    notes: HashMap<String, Note>,
    presence: HashMap<UserId, PresenceRecord>,
    note_subscribers: Vec<NoteSender>,
    presence_subscribers: Vec<PresenceSender>,
}

impl RoomState {
    fn note_snapshot(&self) -> Vec<Note> {
        self.notes.values().cloned().collect()
    }

    fn presence_snapshot(&self) -> Vec<PresenceRecord> {
        self.presence.values().cloned().collect()
    }

    fn broadcast_notes(&mut self) {
        let snapshot = self.note_snapshot();
        self.note_subscribers
            .retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
    }

    fn broadcast_presence(&mut self) {
        let snapshot = self.presence_snapshot();
        self.presence_subscribers
            .retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
    }
}

#[derive(Default)]
struct RemoteInner {
    rooms: HashMap<RoomId, RoomState>,
    /// Remaining forced failures per operation.
    failures: HashMap<RemoteOp, usize>,
    calls: Vec<RemoteCall>,
    latency: Duration,
}

impl RemoteInner {
    fn room(&mut self, room_id: &str) -> &mut RoomState {
        self.rooms.entry(room_id.to_owned()).or_default()
    }

    fn take_failure(&mut self, op: RemoteOp) -> Result<(), SyncError> {
        let Some(remaining) = self.failures.get_mut(&op) else {
            return Ok(());
        };
        *remaining -= 1;
        if *remaining == 0 {
            self.failures.remove(&op);
        }
        Err(SyncError::network(op.name(), "injected failure"))
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Shared in-process remote. Clones point at the same rooms.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    inner: Arc<Mutex<RemoteInner>>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make the next `times` calls of `op` fail with a network error.
    pub fn fail_next(&self, op: RemoteOp, times: usize) {
        if times == 0 {
            return;
        }
        *self.lock().failures.entry(op).or_insert(0) += times;
    }

    /// Push a channel error to every note subscriber of a room.
    pub fn inject_channel_error(&self, room_id: &str) {
        let mut inner = self.lock();
        let room = inner.room(room_id);
        room.note_subscribers
            .retain(|tx| tx.send(Err(SyncError::network("note subscription", "channel error"))).is_ok());
    }

    /// Drop every subscriber of a room, ending their streams.
    pub fn close_subscriptions(&self, room_id: &str) {
        let mut inner = self.lock();
        let room = inner.room(room_id);
        room.note_subscribers.clear();
        room.presence_subscribers.clear();
    }

    #[must_use]
    pub fn notes(&self, room_id: &str) -> Vec<Note> {
        self.lock()
            .rooms
            .get(room_id)
            .map(RoomState::note_snapshot)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn note(&self, room_id: &str, note_id: &str) -> Option<Note> {
        self.lock()
            .rooms
            .get(room_id)
            .and_then(|room| room.notes.get(note_id).cloned())
    }

    #[must_use]
    pub fn presence(&self, room_id: &str) -> Vec<PresenceRecord> {
        self.lock()
            .rooms
            .get(room_id)
            .map(RoomState::presence_snapshot)
            .unwrap_or_default()
    }

    /// Log of accepted mutations, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Accepted `UpdateNote` patches for one note, oldest first.
    #[must_use]
    pub fn updates_for(&self, note_id: &str) -> Vec<NotePatch> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::UpdateNote { note_id: id, patch, .. } if id == note_id => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    /// Seed a note directly, as if another client had created it.
    pub fn seed_note(&self, room_id: &str, mut note: Note) -> String {
        let id = Uuid::new_v4().to_string();
        note.id = NoteId::confirmed(id.clone());
        let mut inner = self.lock();
        let room = inner.room(room_id);
        room.notes.insert(id.clone(), note);
        room.broadcast_notes();
        id
    }

    async fn enter(&self, op: RemoteOp) -> Result<(), SyncError> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.lock().take_failure(op)
    }
}

#[async_trait]
impl NoteChannel for InMemoryRemote {
    async fn subscribe_notes(&self, room_id: &str) -> Result<Subscription<Vec<Note>>, SyncError> {
        self.enter(RemoteOp::SubscribeNotes).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let room = inner.room(room_id);
        // Initial snapshot, like a snapshot listener's first callback.
        if tx.send(Ok(room.note_snapshot())).is_ok() {
            room.note_subscribers.push(tx);
        }
        Ok(Subscription::new(rx))
    }

    async fn create_note(&self, room_id: &str, note: &Note) -> Result<String, SyncError> {
        self.enter(RemoteOp::CreateNote).await?;
        let id = Uuid::new_v4().to_string();
        let mut stored = note.clone();
        stored.id = NoteId::confirmed(id.clone());
        stored.last_modified = now_ms();

        let mut inner = self.lock();
        let room = inner.room(room_id);
        room.notes.insert(id.clone(), stored);
        room.broadcast_notes();
        inner
            .calls
            .push(RemoteCall::CreateNote { room_id: room_id.to_owned(), note_id: id.clone() });
        Ok(id)
    }

    async fn update_note(&self, room_id: &str, note_id: &str, patch: &NotePatch) -> Result<(), SyncError> {
        self.enter(RemoteOp::UpdateNote).await?;
        let mut inner = self.lock();
        let room = inner.room(room_id);
        let note = room
            .notes
            .get_mut(note_id)
            .ok_or_else(|| SyncError::not_found("note", note_id))?;
        note.apply_patch(patch, now_ms())?;
        room.broadcast_notes();
        inner.calls.push(RemoteCall::UpdateNote {
            room_id: room_id.to_owned(),
            note_id: note_id.to_owned(),
            patch: patch.clone(),
        });
        Ok(())
    }

    async fn delete_note(&self, room_id: &str, note_id: &str) -> Result<(), SyncError> {
        self.enter(RemoteOp::DeleteNote).await?;
        let mut inner = self.lock();
        let room = inner.room(room_id);
        if room.notes.remove(note_id).is_some() {
            room.broadcast_notes();
        }
        inner
            .calls
            .push(RemoteCall::DeleteNote { room_id: room_id.to_owned(), note_id: note_id.to_owned() });
        Ok(())
    }
}

#[async_trait]
impl PresenceChannel for InMemoryRemote {
    async fn subscribe_presence(&self, room_id: &str) -> Result<Subscription<Vec<PresenceRecord>>, SyncError> {
        self.enter(RemoteOp::SubscribePresence).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let room = inner.room(room_id);
        if tx.send(Ok(room.presence_snapshot())).is_ok() {
            room.presence_subscribers.push(tx);
        }
        Ok(Subscription::new(rx))
    }

    async fn join_presence(&self, room_id: &str, user_id: &str) -> Result<(), SyncError> {
        self.enter(RemoteOp::JoinPresence).await?;
        let mut inner = self.lock();
        let room = inner.room(room_id);
        room.presence
            .insert(user_id.to_owned(), PresenceRecord::joined(user_id, now_ms()));
        room.broadcast_presence();
        inner
            .calls
            .push(RemoteCall::JoinPresence { room_id: room_id.to_owned(), user_id: user_id.to_owned() });
        Ok(())
    }

    async fn leave_presence(&self, room_id: &str, user_id: &str) -> Result<(), SyncError> {
        self.enter(RemoteOp::LeavePresence).await?;
        let mut inner = self.lock();
        let room = inner.room(room_id);
        if room.presence.remove(user_id).is_some() {
            room.broadcast_presence();
        }
        inner
            .calls
            .push(RemoteCall::LeavePresence { room_id: room_id.to_owned(), user_id: user_id.to_owned() });
        Ok(())
    }

    async fn set_typing(&self, room_id: &str, user_id: &str, is_writing: bool) -> Result<(), SyncError> {
        self.enter(RemoteOp::SetTyping).await?;
        let mut inner = self.lock();
        let room = inner.room(room_id);
        let record = room
            .presence
            .get_mut(user_id)
            .ok_or_else(|| SyncError::not_found("presence", user_id))?;
        record.is_writing = is_writing;
        record.last_active = now_ms();
        room.broadcast_presence();
        inner.calls.push(RemoteCall::SetTyping {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            is_writing,
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
