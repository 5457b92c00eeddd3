//! Presence — who is in the room and who is typing.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each (room, user) pair walks a small state machine:
//!
//! ```text
//! ABSENT --join--> PRESENT --focus--> WRITING --blur--> PRESENT --leave--> ABSENT
//! ```
//!
//! Typing updates are best effort: a failure (typically the entry was already
//! removed) is logged and swallowed. Display names and avatars always come
//! from the identity resolver, never from fields embedded in the presence
//! record, so renamed users do not show stale profiles.
//!
//! LIMITATIONS
//! ===========
//! Entries carry no heartbeat or TTL. A client that crashes or loses its
//! network without leaving stays "online" until someone removes the entry.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::identity::{IdentityResolver, Profile};
use crate::note::{RoomId, UserId};
use crate::remote::PresenceChannel;

/// Presence entry as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub is_writing: bool,
    /// Milliseconds since Unix epoch.
    pub last_active: i64,
    /// Name some writers embed in the record. Never used for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PresenceRecord {
    #[must_use]
    pub fn joined(user_id: impl Into<UserId>, now: i64) -> Self {
        Self { user_id: user_id.into(), is_writing: false, last_active: now, display_name: None }
    }
}

/// Local view of our own presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    Absent,
    Present,
    Writing,
}

/// A presence record hydrated with its resolved profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceView {
    pub user_id: UserId,
    /// `None` when the resolver could not find the user.
    pub profile: Option<Profile>,
    pub is_writing: bool,
    pub last_active: i64,
}

/// Drives our own presence entry and renders everyone else's.
#[derive(Clone)]
pub struct PresenceTracker {
    channel: Arc<dyn PresenceChannel>,
    resolver: IdentityResolver,
    room_id: RoomId,
    user_id: UserId,
    state: Arc<Mutex<PresenceState>>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(
        channel: Arc<dyn PresenceChannel>,
        resolver: IdentityResolver,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self {
            channel,
            resolver,
            room_id: room_id.into(),
            user_id: user_id.into(),
            state: Arc::new(Mutex::new(PresenceState::Absent)),
        }
    }

    #[must_use]
    pub fn state(&self) -> PresenceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: PresenceState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Write our presence entry with `is_writing = false`.
    ///
    /// # Errors
    ///
    /// Returns the channel error; the state stays `Absent`.
    pub async fn join(&self) -> Result<(), SyncError> {
        self.channel
            .join_presence(&self.room_id, &self.user_id)
            .await?;
        self.set_state(PresenceState::Present);
        info!(room_id = %self.room_id, user_id = %self.user_id, "joined room");
        Ok(())
    }

    /// Remove our presence entry. Best effort: failures are logged.
    pub async fn leave(&self) {
        self.set_state(PresenceState::Absent);
        match self
            .channel
            .leave_presence(&self.room_id, &self.user_id)
            .await
        {
            Ok(()) => info!(room_id = %self.room_id, user_id = %self.user_id, "left room"),
            Err(e) => warn!(error = %e, room_id = %self.room_id, "leave presence failed"),
        }
    }

    /// Flip the typing flag. Ignored while absent; failures are swallowed.
    pub async fn set_typing(&self, is_writing: bool) {
        if self.state() == PresenceState::Absent {
            warn!(room_id = %self.room_id, is_writing, "typing update while absent; ignored");
            return;
        }
        self.set_state(if is_writing { PresenceState::Writing } else { PresenceState::Present });
        if let Err(e) = self
            .channel
            .set_typing(&self.room_id, &self.user_id, is_writing)
            .await
        {
            warn!(error = %e, room_id = %self.room_id, is_writing, "set typing failed; ignored");
        }
    }

    /// Hydrate records with profiles from the resolver.
    pub async fn display(&self, records: &[PresenceRecord]) -> Vec<PresenceView> {
        let ids: Vec<UserId> = records.iter().map(|r| r.user_id.clone()).collect();
        let profiles = self.resolver.resolve_many(&ids).await;
        records
            .iter()
            .zip(profiles)
            .map(|(record, profile)| PresenceView {
                user_id: record.user_id.clone(),
                profile,
                is_writing: record.is_writing,
                last_active: record.last_active,
            })
            .collect()
    }
}
