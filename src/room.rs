//! Room session — one user's live view of one room.
//!
//! ARCHITECTURE
//! ============
//! `RoomSession` wires the pieces together:
//!
//! ```text
//! keystroke / gesture ──> NoteStore (sync, optimistic)
//!                            │
//!                            ├──> DebouncedWriter ──> NoteWriter ──> NoteChannel
//!                            └──> NoteWriter (immediate updates, deletes)
//!
//! NoteChannel snapshots ──> note pump ──> NoteStore::merge_snapshot
//! PresenceChannel snapshots ──> presence pump ──> presence records
//! ```
//!
//! Local operations never await the network. Remote work runs on spawned
//! tasks and reports failures as notices. The subscription pumps hold only a
//! weak reference to the session, so dropping the last handle stops them.
//!
//! LOCKING
//! =======
//! Store, gesture and presence-record state each sit behind their own
//! `std::sync::Mutex`. None is held across an `.await`. The only nesting is
//! store then debounce (an edit is scheduled under the id it was applied to);
//! nothing takes the store lock while holding the debounce lock.
//!
//! IDS
//! ===
//! `create_note` hands out a temporary id. Every entry point that takes a
//! note id resolves it through the store first, so that id keeps working
//! after the create is confirmed and the note has moved to its remote id.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::debounce::DebouncedWriter;
use crate::error::{ErrorCode, SyncError};
use crate::gesture::{Camera, GestureCommit, GestureEngine, GesturePreview, Point};
use crate::identity::{IdentityResolver, StaticProfiles};
use crate::note::{Note, NoteContent, NoteId, NoteKind, NotePatch, RoomId, UserId, now_ms};
use crate::notice::{Notice, Notifier};
use crate::presence::{PresenceRecord, PresenceState, PresenceTracker, PresenceView};
use crate::remote::writer::WriteOutcome;
use crate::remote::{InMemoryRemote, NoteChannel, NoteWriter, PresenceChannel, Subscription};
use crate::store::{MergeReport, NoteStore, SessionEnd, SessionKind};
use crate::upload::{ImageFile, ImageUploader, InMemoryUploader, ProgressFn};

/// External services a room session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub notes: Arc<dyn NoteChannel>,
    pub presence: Arc<dyn PresenceChannel>,
    pub identity: IdentityResolver,
    pub uploader: Arc<dyn ImageUploader>,
}

impl Collaborators {
    /// Everything backed by in-process reference implementations.
    #[must_use]
    pub fn in_memory(remote: &InMemoryRemote, uploader: &InMemoryUploader, profiles: StaticProfiles) -> Self {
        Self {
            notes: Arc::new(remote.clone()),
            presence: Arc::new(remote.clone()),
            identity: IdentityResolver::new(Arc::new(profiles)),
            uploader: Arc::new(uploader.clone()),
        }
    }
}

struct RoomShared {
    room_id: RoomId,
    user_id: UserId,
    config: SyncConfig,
    notes: Arc<dyn NoteChannel>,
    presence_channel: Arc<dyn PresenceChannel>,
    uploader: Arc<dyn ImageUploader>,
    writer: NoteWriter,
    debounce: DebouncedWriter,
    presence: PresenceTracker,
    notices: Notifier,
    store: Mutex<NoteStore>,
    gestures: Mutex<GestureEngine>,
    presence_records: Mutex<Vec<PresenceRecord>>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for RoomShared {
    fn drop(&mut self) {
        for pump in self.pumps.get_mut().unwrap_or_else(PoisonError::into_inner).drain(..) {
            pump.abort();
        }
        self.debounce.cancel_all();
    }
}

/// Handle to a joined room. Cheap to clone.
#[derive(Clone)]
pub struct RoomSession {
    inner: Arc<RoomShared>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl RoomSession {
    /// Build a session and the notice receiver the host drains into toasts.
    /// Call [`RoomSession::enter`] to start syncing.
    #[must_use]
    pub fn new(
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
        collaborators: Collaborators,
        config: SyncConfig,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let room_id = room_id.into();
        let user_id = user_id.into();
        let (notices, rx) = Notifier::channel(config.notice_capacity);
        let writer = NoteWriter::new(Arc::clone(&collaborators.notes), room_id.clone(), notices.clone());
        let debounce = DebouncedWriter::new(writer.clone(), config.debounce);
        let presence = PresenceTracker::new(
            Arc::clone(&collaborators.presence),
            collaborators.identity,
            room_id.clone(),
            user_id.clone(),
        );

        let inner = RoomShared {
            room_id,
            user_id,
            config,
            notes: collaborators.notes,
            presence_channel: collaborators.presence,
            uploader: collaborators.uploader,
            writer,
            debounce,
            presence,
            notices,
            store: Mutex::new(NoteStore::new()),
            gestures: Mutex::new(GestureEngine::default()),
            presence_records: Mutex::new(Vec::new()),
            pumps: Mutex::new(Vec::new()),
        };
        (Self { inner: Arc::new(inner) }, rx)
    }

    /// Subscribe to notes and presence, then join the room. Failures degrade
    /// to an empty view plus a notice; this never fails.
    pub async fn enter(&self) {
        let shared = &self.inner;
        info!(room_id = %shared.room_id, user_id = %shared.user_id, "entering room");

        match shared.notes.subscribe_notes(&shared.room_id).await {
            Ok(sub) => {
                let pump = tokio::spawn(pump_notes(Arc::downgrade(shared), sub));
                shared.pumps().push(pump);
            }
            Err(e) => {
                warn!(error = %e, room_id = %shared.room_id, "note subscription failed");
                shared.notices.failure("loading notes", &e);
            }
        }

        match shared.presence_channel.subscribe_presence(&shared.room_id).await {
            Ok(sub) => {
                let pump = tokio::spawn(pump_presence(Arc::downgrade(shared), sub));
                shared.pumps().push(pump);
            }
            Err(e) => {
                warn!(error = %e, room_id = %shared.room_id, "presence subscription failed");
                shared.notices.failure("loading presence", &e);
            }
        }

        if let Err(e) = shared.presence.join().await {
            warn!(error = %e, room_id = %shared.room_id, "join presence failed");
            shared.notices.failure("joining room", &e);
        }
    }

    /// Tear the session down: cancel pending writes, stop both pumps and
    /// remove our presence entry (best effort). Writes already handed to the
    /// remote are not cancelled.
    pub async fn leave(&self) {
        let shared = &self.inner;
        let dropped = shared.debounce.cancel_all();
        shared.gestures().cancel();
        for pump in shared.pumps().drain(..) {
            pump.abort();
        }
        shared.presence.leave().await;
        info!(room_id = %shared.room_id, user_id = %shared.user_id, dropped_writes = dropped, "left room");
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.inner.room_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    #[must_use]
    pub fn config(&self) -> SyncConfig {
        self.inner.config
    }
}

// =============================================================================
// NOTE OPERATIONS
// =============================================================================

impl RoomSession {
    /// Insert a note locally under a temporary id and create it remotely in
    /// the background. `content` defaults to empty content of `kind`.
    ///
    /// # Errors
    ///
    /// `Validation` if `content` does not match `kind` or a coordinate is not
    /// finite. Remote failures arrive later as a notice and remove the note.
    pub fn create_note(
        &self,
        kind: NoteKind,
        x: f64,
        y: f64,
        content: Option<NoteContent>,
    ) -> Result<NoteId, SyncError> {
        let content = content.unwrap_or_else(|| NoteContent::empty(kind));
        if content.kind() != kind {
            return Err(SyncError::Validation(format!("{:?} content for a {kind:?} note", content.kind())));
        }
        check_position(x, y)?;

        let note = Note::new(NoteId::temp(), content, x, y, self.inner.user_id.clone(), now_ms());
        let id = note.id.clone();
        self.inner.store().insert(note.clone());
        debug!(note_id = %id, ?kind, x, y, "note created locally");
        spawn_create(&self.inner, note);
        Ok(id)
    }

    /// Apply a patch locally and write it remotely right away.
    ///
    /// A note whose create is still pending keeps the local change, but the
    /// remote write is dropped; the pending create carries only the content
    /// the note was created with.
    ///
    /// # Errors
    ///
    /// `UnknownNote` or `Validation`; nothing is applied in either case.
    pub fn update_note(&self, id: &NoteId, patch: NotePatch) -> Result<(), SyncError> {
        let id = {
            let mut store = self.inner.store();
            let id = store.resolve(id);
            store.apply_patch(&id, &patch, now_ms())?;
            id
        };
        self.inner.debounce.supersede(&id, &patch);
        spawn_update(&self.inner, id, patch);
        Ok(())
    }

    /// Apply a field edit locally and schedule a debounced remote write.
    ///
    /// # Errors
    ///
    /// `UnknownNote` or `Validation`; nothing is applied in either case.
    pub fn edit_note(&self, id: &NoteId, patch: NotePatch) -> Result<(), SyncError> {
        let mut store = self.inner.store();
        let id = store.resolve(id);
        store.apply_patch(&id, &patch, now_ms())?;
        self.inner.debounce.schedule(&id, patch);
        Ok(())
    }

    /// Remove a note locally and, if confirmed, remotely. Deleting a note
    /// whose create is still pending cancels that create.
    ///
    /// # Errors
    ///
    /// `UnknownNote` if the note is not in the local store.
    pub fn delete_note(&self, id: &NoteId) -> Result<(), SyncError> {
        let shared = &self.inner;
        let id = &shared.resolve(id);
        shared
            .store()
            .remove(id)
            .ok_or_else(|| SyncError::UnknownNote(id.clone()))?;
        shared.debounce.cancel(id);
        shared.cancel_gesture_on(id);

        if id.is_temp() {
            shared.store().cancel_create(id);
            debug!(note_id = %id, "pending create cancelled");
        } else {
            shared.store().tombstone(id.clone());
            spawn_delete(shared, id.clone());
        }
        Ok(())
    }

    /// Copy a confirmed note, offset on both axes, attributed to this user.
    ///
    /// # Errors
    ///
    /// `UnknownNote`, or `Validation` if the note is not confirmed yet.
    pub fn duplicate_note(&self, id: &NoteId) -> Result<NoteId, SyncError> {
        let shared = &self.inner;
        let id = &shared.resolve(id);
        let source = shared
            .store()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownNote(id.clone()))?;
        if id.is_temp() {
            return Err(SyncError::Validation(format!("note {id} is not saved yet")));
        }
        let copy = source.duplicate(NoteId::temp(), shared.user_id.clone(), shared.config.duplicate_offset, now_ms());
        let copy_id = copy.id.clone();
        shared.store().insert(copy.clone());
        debug!(source_id = %id, note_id = %copy_id, "note duplicated");
        spawn_create(shared, copy);
        Ok(copy_id)
    }

    /// Remove every note. Returns how many were removed locally.
    pub fn clear_canvas(&self) -> usize {
        let shared = &self.inner;
        let removed = shared.store().clear();
        shared.debounce.cancel_all();
        shared.gestures().cancel();

        for note in &removed {
            if note.id.is_temp() {
                shared.store().cancel_create(&note.id);
            } else {
                shared.store().tombstone(note.id.clone());
                spawn_delete(shared, note.id.clone());
            }
        }
        info!(room_id = %shared.room_id, count = removed.len(), "canvas cleared");
        shared
            .notices
            .info("CANVAS_CLEARED", format!("{} notes removed", removed.len()));
        removed.len()
    }

    /// Upload an image, then create an image note showing it.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad position or non-image file; the upload error
    /// (also pushed as a notice) if the upload fails. Nothing is created on
    /// error.
    pub async fn create_image_note(
        &self,
        x: f64,
        y: f64,
        file: ImageFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<NoteId, SyncError> {
        check_position(x, y)?;
        file.validate()?;
        let shared = &self.inner;
        match shared
            .uploader
            .upload_image(&shared.room_id, &file, on_progress)
            .await
        {
            Ok(url) => self.create_note(NoteKind::Image, x, y, Some(NoteContent::Image(url))),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), file = %file.name, "image upload failed");
                shared.notices.failure("uploading image", &e);
                Err(e)
            }
        }
    }

    /// Merge a full remote snapshot into the local store.
    pub fn apply_remote_snapshot(&self, snapshot: Vec<Note>) -> MergeReport {
        self.inner.merge_remote(snapshot)
    }
}

// =============================================================================
// FIELD FOCUS AND GESTURES
// =============================================================================

impl RoomSession {
    /// A text field of the note gained focus: remote pushes for it are held
    /// back and we show as typing.
    ///
    /// # Errors
    ///
    /// `UnknownNote` if the note is not in the local store.
    pub async fn focus_field(&self, id: &NoteId) -> Result<(), SyncError> {
        {
            let mut store = self.inner.store();
            let id = store.resolve(id);
            if !store.contains(&id) {
                return Err(SyncError::UnknownNote(id));
            }
            store.begin_session(&id, SessionKind::Field);
        }
        self.inner.presence.set_typing(true).await;
        Ok(())
    }

    /// A text field of the note lost focus: apply any held-back remote
    /// version and stop showing as typing.
    pub async fn blur_field(&self, id: &NoteId) {
        let id = self.inner.resolve(id);
        self.inner.end_session(&id, SessionKind::Field);
        self.inner.presence.set_typing(false).await;
    }

    /// # Errors
    ///
    /// `UnknownNote`, or `Validation` if another gesture is active or the
    /// point is not finite.
    pub fn begin_drag(&self, id: &NoteId, screen: Point) -> Result<(), SyncError> {
        let note = self.inner.note_or_err(id)?;
        let id = &note.id;
        self.inner.gestures().begin_drag(&note, screen)?;
        self.inner.store().begin_session(id, SessionKind::Gesture);
        Ok(())
    }

    /// # Errors
    ///
    /// `UnknownNote`, or `Validation` if another gesture is active or the
    /// point is not finite.
    pub fn begin_resize(&self, id: &NoteId, screen: Point) -> Result<(), SyncError> {
        let note = self.inner.note_or_err(id)?;
        let id = &note.id;
        self.inner.gestures().begin_resize(&note, screen)?;
        self.inner.store().begin_session(id, SessionKind::Gesture);
        Ok(())
    }

    /// Transient feedback for the pointer position. Never writes.
    pub fn pointer_move(&self, screen: Point) -> GesturePreview {
        self.inner.gestures().pointer_move(screen)
    }

    /// Release the pointer: commit the gesture locally, guard the note's
    /// geometry against remote overwrite for a short window, and write it.
    ///
    /// # Errors
    ///
    /// `UnknownNote` or `Validation` if the commit could not be applied.
    pub fn end_gesture(&self, screen: Point) -> Result<Option<GestureCommit>, SyncError> {
        let shared = &self.inner;
        let Some(commit) = shared.gestures().finish(screen) else {
            return Ok(None);
        };
        let now = Instant::now();
        let pending = shared.debounce.pending(&commit.id);

        let end = {
            let mut store = shared.store();
            let applied = store.apply_patch(&commit.id, &commit.patch, now_ms()).map(|_| ());
            store.guard_until(&commit.id, now + shared.config.resize_guard);
            let end = store.end_session(&commit.id, SessionKind::Gesture, pending.as_ref(), now);
            applied.map(|()| end)
        }?;

        if end == SessionEnd::Removed {
            shared.debounce.cancel(&commit.id);
            return Ok(Some(commit));
        }
        shared.debounce.supersede(&commit.id, &commit.patch);
        spawn_update(shared, commit.id.clone(), commit.patch.clone());
        Ok(Some(commit))
    }

    /// Abandon the current gesture without writing.
    pub fn cancel_gesture(&self) {
        let cancelled = self.inner.gestures().cancel();
        if let Some(id) = cancelled {
            self.inner.end_session(&id, SessionKind::Gesture);
        }
    }

    pub fn set_camera(&self, camera: Camera) {
        self.inner.gestures().set_camera(camera);
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.inner.gestures().camera()
    }
}

// =============================================================================
// QUERIES
// =============================================================================

impl RoomSession {
    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<Note> {
        let store = self.inner.store();
        store.get(&store.resolve(id)).cloned()
    }

    /// All notes in creation order.
    #[must_use]
    pub fn notes(&self) -> Vec<Note> {
        self.inner
            .store()
            .sorted_notes()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Whether the note has a focused field or a gesture in progress.
    #[must_use]
    pub fn is_editing(&self, id: &NoteId) -> bool {
        let store = self.inner.store();
        store.has_session(&store.resolve(id))
    }

    /// Number of notes with unsent debounced edits.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.inner.debounce.pending_count()
    }

    #[must_use]
    pub fn presence_state(&self) -> PresenceState {
        self.inner.presence.state()
    }

    /// Everyone in the room, with profiles from the identity resolver.
    pub async fn presence(&self) -> Vec<PresenceView> {
        let records = self.inner.presence_records().clone();
        self.inner.presence.display(&records).await
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

impl RoomShared {
    fn store(&self) -> MutexGuard<'_, NoteStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gestures(&self) -> MutexGuard<'_, GestureEngine> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn presence_records(&self) -> MutexGuard<'_, Vec<PresenceRecord>> {
        self.presence_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pumps(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pumps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, id: &NoteId) -> NoteId {
        self.store().resolve(id)
    }

    fn note_or_err(&self, id: &NoteId) -> Result<Note, SyncError> {
        let store = self.store();
        store
            .get(&store.resolve(id))
            .cloned()
            .ok_or_else(|| SyncError::UnknownNote(id.clone()))
    }

    fn cancel_gesture_on(&self, id: &NoteId) {
        let mut gestures = self.gestures();
        if gestures.active_note() == Some(id) {
            gestures.cancel();
        }
    }

    fn end_session(&self, id: &NoteId, kind: SessionKind) {
        let pending = self.debounce.pending(id);
        let end = self
            .store()
            .end_session(id, kind, pending.as_ref(), Instant::now());
        if end == SessionEnd::Removed {
            self.debounce.cancel(id);
        }
    }

    fn merge_remote(&self, snapshot: Vec<Note>) -> MergeReport {
        let pending = self.debounce.pending_patches();
        let report = self.store().merge_snapshot(snapshot, &pending, Instant::now());
        for id in &report.removed {
            self.debounce.cancel(id);
        }
        debug!(
            room_id = %self.room_id,
            applied = report.applied,
            deferred = report.deferred,
            guarded = report.guarded,
            removed = report.removed.len(),
            "remote snapshot merged"
        );
        report
    }

    async fn finish_create(&self, note: Note) {
        let temp = note.id.clone();
        let confirmed = match self.notes.create_note(&self.room_id, &note).await {
            Ok(raw) => NoteId::confirmed(raw),
            Err(e) => {
                error!(error = %e, note_id = %temp, room_id = %self.room_id, "note create failed");
                self.store().remove(&temp);
                self.store().take_cancelled(&temp);
                self.debounce.cancel(&temp);
                self.cancel_gesture_on(&temp);
                self.notices.failure("creating note", &e);
                return;
            }
        };

        let reconciled = {
            let mut store = self.store();
            !store.take_cancelled(&temp) && store.reconcile(&temp, &confirmed)
        };
        if !reconciled {
            info!(note_id = %confirmed, "note deleted before its create landed; removing remotely");
            self.store().tombstone(confirmed.clone());
            self.delete_remote(&confirmed).await;
            return;
        }
        self.debounce.rekey(&temp, &confirmed);
        self.gestures().rekey(&temp, &confirmed);
        debug!(temp_id = %temp, note_id = %confirmed, "note create confirmed");
    }

    async fn delete_remote(&self, id: &NoteId) {
        if let WriteOutcome::Failed(_) = self.writer.delete(id).await {
            self.store().lift_tombstone(id);
        }
    }
}

fn check_position(x: f64, y: f64) -> Result<(), SyncError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(SyncError::Validation(format!("position ({x}, {y}) must be finite")))
    }
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

fn spawn_create(shared: &Arc<RoomShared>, note: Note) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        shared.finish_create(note).await;
    });
}

fn spawn_update(shared: &Arc<RoomShared>, id: NoteId, patch: NotePatch) {
    let writer = shared.writer.clone();
    tokio::spawn(async move {
        writer.update(&id, &patch).await;
    });
}

fn spawn_delete(shared: &Arc<RoomShared>, id: NoteId) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        shared.delete_remote(&id).await;
    });
}

async fn pump_notes(room: Weak<RoomShared>, mut sub: Subscription<Vec<Note>>) {
    while let Some(item) = sub.next().await {
        let Some(shared) = room.upgrade() else {
            break;
        };
        let snapshot = match item {
            Ok(notes) => notes,
            Err(e) => {
                warn!(error = %e, room_id = %shared.room_id, "note subscription error; showing empty canvas");
                shared.notices.failure("syncing notes", &e);
                Vec::new()
            }
        };
        shared.merge_remote(snapshot);
    }
    debug!("note subscription ended");
}

async fn pump_presence(room: Weak<RoomShared>, mut sub: Subscription<Vec<PresenceRecord>>) {
    while let Some(item) = sub.next().await {
        let Some(shared) = room.upgrade() else {
            break;
        };
        let records = match item {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, room_id = %shared.room_id, "presence subscription error");
                shared.notices.failure("syncing presence", &e);
                Vec::new()
            }
        };
        *shared.presence_records() = records;
    }
    debug!("presence subscription ended");
}
