//! Note store: the local, optimistic cache of every note in a room.
//!
//! Local mutations land here synchronously and are visible immediately. Remote
//! pushes arrive as full snapshots and are merged by `merge_snapshot`, which
//! is where the engine's conflict tolerance lives.
//!
//! MERGE RULES
//! ===========
//! For each note in an incoming snapshot:
//!
//! - An active edit session (focused field or gesture in flight) defers the
//!   remote version until the session ends. The latest deferred version wins.
//! - Inside a post-gesture guard window the remote version is applied but the
//!   local position and size are kept.
//! - Unsent debounced fields are re-applied on top, so in-flight keystrokes
//!   survive a push that predates them.
//!
//! Confirmed notes missing from a snapshot are removed (or the removal is
//! deferred behind a session). Temporary notes are never removed by a
//! snapshot; they only exist locally until their create is confirmed.
//!
//! `reconcile` records every `temp -> confirmed` rewrite in an alias map, so
//! a temporary id the host still holds keeps addressing the same note after
//! its create lands. Use `resolve` before any lookup by a host-supplied id.
//!
//! Two id sets paper over snapshot ordering: `awaiting_echo` keeps a freshly
//! confirmed note alive until a snapshot containing it arrives, and
//! `tombstones` keeps a locally deleted note hidden until a snapshot without
//! it arrives.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::{HashMap, HashSet};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::note::{Note, NoteId, NotePatch};

/// What keeps a note in an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A text field of the note has focus.
    Field,
    /// A drag or resize gesture is in progress.
    Gesture,
}

#[derive(Debug, Default, Clone, Copy)]
struct EditSession {
    /// Focus can move between fields of one note before the old blur arrives.
    focused: u32,
    gesture: bool,
}

impl EditSession {
    fn is_active(self) -> bool {
        self.focused > 0 || self.gesture
    }
}

/// Remote change held back while a session is active.
#[derive(Debug, Clone)]
enum Deferred {
    Replace(Note),
    Remove,
}

/// Result of ending an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Another session kind is still active on the note.
    StillActive,
    /// Session ended; nothing was deferred.
    Idle,
    /// A deferred remote version was applied.
    Applied,
    /// A deferred remote removal was applied.
    Removed,
}

/// Counts from one snapshot merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: usize,
    pub deferred: usize,
    /// Remote versions applied with local geometry kept.
    pub guarded: usize,
    /// Notes dropped because the snapshot no longer had them.
    pub removed: Vec<NoteId>,
}

/// Local note cache for one room.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: HashMap<NoteId, Note>,
    sessions: HashMap<NoteId, EditSession>,
    deferred: HashMap<NoteId, Deferred>,
    guards: HashMap<NoteId, Instant>,
    cancelled_creates: HashSet<NoteId>,
    awaiting_echo: HashSet<NoteId>,
    tombstones: HashSet<NoteId>,
    aliases: HashMap<NoteId, NoteId>,
}

impl NoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// All notes ordered by creation time, ties broken by id.
    #[must_use]
    pub fn sorted_notes(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.values().collect();
        notes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        notes
    }

    /// The id a note currently lives under: the confirmed id for a
    /// reconciled temporary id, otherwise `id` itself.
    #[must_use]
    pub fn resolve(&self, id: &NoteId) -> NoteId {
        self.aliases.get(id).unwrap_or(id).clone()
    }

    #[must_use]
    pub fn has_session(&self, id: &NoteId) -> bool {
        self.sessions.get(id).is_some_and(|s| s.is_active())
    }

    #[must_use]
    pub fn is_guarded(&self, id: &NoteId, now: Instant) -> bool {
        self.guards.get(id).is_some_and(|until| now < *until)
    }

    // =========================================================================
    // LOCAL MUTATIONS
    // =========================================================================

    /// Insert or replace a note.
    pub fn insert(&mut self, note: Note) {
        self.notes.insert(note.id.clone(), note);
    }

    /// Merge a patch into a local note.
    ///
    /// # Errors
    ///
    /// `UnknownNote` if the id is not in the store, `Validation` if the patch
    /// does not fit the note's kind.
    pub fn apply_patch(&mut self, id: &NoteId, patch: &NotePatch, now_ms: i64) -> Result<&Note, SyncError> {
        let note = self
            .notes
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownNote(id.clone()))?;
        note.apply_patch(patch, now_ms)?;
        Ok(note)
    }

    /// Remove a note and everything tracked for it.
    pub fn remove(&mut self, id: &NoteId) -> Option<Note> {
        self.forget(id);
        self.notes.remove(id)
    }

    /// Remove every note. Returns the removed notes.
    pub fn clear(&mut self) -> Vec<Note> {
        self.sessions.clear();
        self.deferred.clear();
        self.guards.clear();
        self.awaiting_echo.clear();
        self.notes.drain().map(|(_, note)| note).collect()
    }

    fn forget(&mut self, id: &NoteId) {
        self.sessions.remove(id);
        self.deferred.remove(id);
        self.guards.remove(id);
        self.awaiting_echo.remove(id);
    }

    /// Hide a confirmed id from snapshots until one arrives without it.
    pub fn tombstone(&mut self, id: NoteId) {
        if !id.is_temp() {
            self.tombstones.insert(id);
        }
    }

    /// Let snapshots show the note again, e.g. after its remote delete failed.
    pub fn lift_tombstone(&mut self, id: &NoteId) {
        self.tombstones.remove(id);
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Rewrite a temporary id to its confirmed id, keeping every local field.
    ///
    /// Returns `false` if the temporary note is gone (deleted meanwhile).
    pub fn reconcile(&mut self, temp: &NoteId, confirmed: &NoteId) -> bool {
        let Some(mut note) = self.notes.remove(temp) else {
            return false;
        };
        note.id = confirmed.clone();
        self.aliases.insert(temp.clone(), confirmed.clone());
        let echoed = self.notes.insert(confirmed.clone(), note).is_some();
        if !echoed {
            self.awaiting_echo.insert(confirmed.clone());
        }
        if let Some(session) = self.sessions.remove(temp) {
            self.sessions.insert(confirmed.clone(), session);
        }
        if let Some(until) = self.guards.remove(temp) {
            self.guards.insert(confirmed.clone(), until);
        }
        debug!(temp_id = %temp, note_id = %confirmed, echoed, "note id reconciled");
        true
    }

    /// Mark a pending create as cancelled (its note was deleted locally).
    pub fn cancel_create(&mut self, temp: &NoteId) {
        if temp.is_temp() {
            self.cancelled_creates.insert(temp.clone());
        }
    }

    /// Consume the cancellation mark for a pending create.
    pub fn take_cancelled(&mut self, temp: &NoteId) -> bool {
        self.cancelled_creates.remove(temp)
    }

    // =========================================================================
    // SESSIONS AND GUARDS
    // =========================================================================

    pub fn begin_session(&mut self, id: &NoteId, kind: SessionKind) {
        if !self.notes.contains_key(id) {
            return;
        }
        let session = self.sessions.entry(id.clone()).or_default();
        match kind {
            SessionKind::Field => session.focused += 1,
            SessionKind::Gesture => session.gesture = true,
        }
    }

    /// End one session kind. When no session remains, any deferred remote
    /// change is applied (with `pending` re-applied on top).
    pub fn end_session(
        &mut self,
        id: &NoteId,
        kind: SessionKind,
        pending: Option<&NotePatch>,
        now: Instant,
    ) -> SessionEnd {
        let Some(session) = self.sessions.get_mut(id) else {
            return SessionEnd::Idle;
        };
        match kind {
            SessionKind::Field => session.focused = session.focused.saturating_sub(1),
            SessionKind::Gesture => session.gesture = false,
        }
        if session.is_active() {
            return SessionEnd::StillActive;
        }
        self.sessions.remove(id);

        match self.deferred.remove(id) {
            None => SessionEnd::Idle,
            Some(Deferred::Remove) => {
                self.remove(id);
                debug!(note_id = %id, "deferred removal applied");
                SessionEnd::Removed
            }
            Some(Deferred::Replace(remote)) => {
                self.accept_remote(remote, pending, now);
                debug!(note_id = %id, "deferred remote version applied");
                SessionEnd::Applied
            }
        }
    }

    /// Keep remote pushes off this note's geometry until `until`.
    pub fn guard_until(&mut self, id: &NoteId, until: Instant) {
        if self.notes.contains_key(id) {
            self.guards.insert(id.clone(), until);
        }
    }

    // =========================================================================
    // REMOTE MERGE
    // =========================================================================

    /// Merge a full remote snapshot. `pending` holds unsent debounced fields.
    pub fn merge_snapshot(
        &mut self,
        snapshot: Vec<Note>,
        pending: &HashMap<NoteId, NotePatch>,
        now: Instant,
    ) -> MergeReport {
        self.guards.retain(|_, until| now < *until);

        let mut report = MergeReport::default();
        let mut seen: HashSet<NoteId> = HashSet::with_capacity(snapshot.len());

        for remote in snapshot {
            let id = remote.id.clone();
            if id.is_temp() {
                warn!(note_id = %id, "remote snapshot carried a temporary id; skipped");
                continue;
            }
            seen.insert(id.clone());
            self.awaiting_echo.remove(&id);
            if self.tombstones.contains(&id) {
                continue;
            }
            if self.has_session(&id) {
                self.deferred.insert(id, Deferred::Replace(remote));
                report.deferred += 1;
                continue;
            }
            if self.accept_remote(remote, pending.get(&id), now) {
                report.guarded += 1;
            }
            report.applied += 1;
        }

        self.tombstones.retain(|id| seen.contains(id));

        let missing: Vec<NoteId> = self
            .notes
            .keys()
            .filter(|id| !id.is_temp() && !seen.contains(*id) && !self.awaiting_echo.contains(*id))
            .cloned()
            .collect();
        for id in missing {
            if self.has_session(&id) {
                self.deferred.insert(id, Deferred::Remove);
                report.deferred += 1;
            } else {
                self.remove(&id);
                report.removed.push(id);
            }
        }
        report
    }

    /// Install a remote version. Returns `true` if local geometry was kept.
    fn accept_remote(&mut self, mut remote: Note, pending: Option<&NotePatch>, now: Instant) -> bool {
        let guarded = self.is_guarded(&remote.id, now);
        if guarded && let Some(local) = self.notes.get(&remote.id) {
            remote.keep_geometry_of(local);
        }
        if let Some(patch) = pending {
            let stamp = remote.last_modified;
            if let Err(e) = remote.apply_patch(patch, stamp) {
                warn!(error = %e, note_id = %remote.id, "pending edit no longer fits remote note; dropped");
            }
        }
        self.notes.insert(remote.id.clone(), remote);
        guarded
    }
}
