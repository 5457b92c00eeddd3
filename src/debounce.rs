//! Debounced propagation — coalesce rapid local edits into one remote write.
//!
//! DESIGN
//! ======
//! Every note with unsent edits owns one pending entry: the accumulated patch
//! plus the `JoinHandle` of its timer task. Each new edit merges into the
//! patch, aborts the old timer and starts a fresh one, so the write goes out
//! only after the note has been idle for the whole interval. When the timer
//! elapses the entry is taken out of the map and the patch is written.
//!
//! Timers identify their entry by generation, not by note id, so an entry can
//! be rekeyed (temporary id -> confirmed id) without losing its timer.
//!
//! ORDERING
//! ========
//! At most one write per note per idle window. No ordering across notes.
//! Cancelling an entry aborts its timer; a write already handed to the
//! remote is never cancelled.

#[cfg(test)]
#[path = "debounce_test.rs"]
mod debounce_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::note::{NoteId, NotePatch};
use crate::remote::NoteWriter;

struct PendingWrite {
    patch: NotePatch,
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceInner {
    pending: HashMap<NoteId, PendingWrite>,
    next_generation: u64,
}

/// Per-note debounce timers in front of a [`NoteWriter`]. Cheap to clone.
#[derive(Clone)]
pub struct DebouncedWriter {
    writer: NoteWriter,
    interval: Duration,
    inner: Arc<Mutex<DebounceInner>>,
}

impl DebouncedWriter {
    #[must_use]
    pub fn new(writer: NoteWriter, interval: Duration) -> Self {
        Self { writer, interval, inner: Arc::new(Mutex::new(DebounceInner::default())) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DebounceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Merge `patch` into the note's pending write and restart its timer.
    pub fn schedule(&self, id: &NoteId, patch: NotePatch) {
        let mut inner = self.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let timer = self.spawn_timer(generation);

        if let Some(entry) = inner.pending.get_mut(id) {
            entry.timer.abort();
            entry.patch.merge(patch);
            entry.generation = generation;
            entry.timer = timer;
        } else {
            inner
                .pending
                .insert(id.clone(), PendingWrite { patch, generation, timer });
        }
    }

    /// Drop the note's pending write and stop its timer.
    pub fn cancel(&self, id: &NoteId) -> Option<NotePatch> {
        let entry = self.lock().pending.remove(id)?;
        entry.timer.abort();
        debug!(note_id = %id, "pending write cancelled");
        Some(entry.patch)
    }

    /// Forget pending fields that an immediate write of `newer` overrides, so
    /// the debounced write cannot land later with older values.
    pub fn supersede(&self, id: &NoteId, newer: &NotePatch) {
        let mut inner = self.lock();
        let Some(entry) = inner.pending.get_mut(id) else {
            return;
        };
        entry.patch.clear_fields_of(newer);
        if entry.patch.is_empty()
            && let Some(entry) = inner.pending.remove(id)
        {
            entry.timer.abort();
        }
    }

    /// Stop every timer. Returns how many pending writes were dropped.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingWrite> = self.lock().pending.drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.timer.abort();
        }
        drained.len()
    }

    /// Move a pending write to a new id, keeping its timer running.
    pub fn rekey(&self, from: &NoteId, to: &NoteId) {
        let mut inner = self.lock();
        if let Some(entry) = inner.pending.remove(from) {
            inner.pending.insert(to.clone(), entry);
        }
    }

    /// Unsent fields for one note.
    #[must_use]
    pub fn pending(&self, id: &NoteId) -> Option<NotePatch> {
        self.lock().pending.get(id).map(|e| e.patch.clone())
    }

    /// Unsent fields for every note.
    #[must_use]
    pub fn pending_patches(&self) -> HashMap<NoteId, NotePatch> {
        self.lock()
            .pending
            .iter()
            .map(|(id, e)| (id.clone(), e.patch.clone()))
            .collect()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn spawn_timer(&self, generation: u64) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.interval).await;
            this.fire(generation).await;
        })
    }

    async fn fire(&self, generation: u64) {
        let taken = {
            let mut inner = self.lock();
            let id = inner
                .pending
                .iter()
                .find(|(_, e)| e.generation == generation)
                .map(|(id, _)| id.clone());
            id.and_then(|id| inner.pending.remove(&id).map(|e| (id, e.patch)))
        };
        // EDGE: superseded or cancelled between wake-up and lock.
        let Some((id, patch)) = taken else {
            return;
        };
        debug!(note_id = %id, "debounce window closed; writing");
        self.writer.update(&id, &patch).await;
    }
}
