use std::time::Duration;

use noteroom::config::SyncConfig;
use noteroom::gesture::{Camera, Point};
use noteroom::identity::{Profile, StaticProfiles};
use noteroom::note::{NoteContent, NoteId, NoteKind, NotePatch};
use noteroom::notice::Notice;
use noteroom::remote::InMemoryRemote;
use noteroom::room::{Collaborators, RoomSession};
use noteroom::upload::InMemoryUploader;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const ROOM: &str = "demo-room";

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "no .env file loaded");
    }

    let config = SyncConfig::from_env();
    tracing::info!(
        debounce_ms = config.debounce.as_millis(),
        resize_guard_ms = config.resize_guard.as_millis(),
        duplicate_offset = config.duplicate_offset,
        "sync config loaded"
    );

    let remote = InMemoryRemote::new();
    let uploader = InMemoryUploader::new();
    let profiles = StaticProfiles::new()
        .with(profile("alice", "Alice", "#e91e63"))
        .with(profile("bob", "Bob", "#3f51b5"));

    let (alice, alice_notices) =
        RoomSession::new(ROOM, "alice", Collaborators::in_memory(&remote, &uploader, profiles.clone()), config);
    let (bob, bob_notices) = RoomSession::new(ROOM, "bob", Collaborators::in_memory(&remote, &uploader, profiles), config);
    tokio::spawn(log_notices("alice", alice_notices));
    tokio::spawn(log_notices("bob", bob_notices));

    alice.enter().await;
    bob.enter().await;

    let temp = match alice.create_note(NoteKind::Text, 500.0, 300.0, None) {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "create failed");
            return;
        }
    };
    let Some(id) = wait_confirmed(&alice).await else {
        tracing::error!(temp_id = %temp, "note was never confirmed");
        return;
    };
    tracing::info!(temp_id = %temp, note_id = %id, "note confirmed");

    // Typing: every keystroke lands locally, one write goes out.
    if let Err(e) = alice.focus_field(&id).await {
        tracing::error!(error = %e, "focus failed");
        return;
    }
    for text in ["S", "Sh", "Shi", "Ship", "Ship it"] {
        if let Err(e) = alice.edit_note(&id, NotePatch::content(NoteContent::Text(text.into()))) {
            tracing::warn!(error = %e, "edit rejected");
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
    alice.blur_field(&id).await;
    tokio::time::sleep(config.debounce + Duration::from_millis(100)).await;
    tracing::info!(updates = remote.updates_for(id.remote_id().unwrap_or_default()).len(), "typing flushed");

    // Drag 100 screen pixels at zoom 2: the note moves 50 canvas units.
    alice.set_camera(Camera::new(0.0, 0.0, 2.0));
    if let Err(e) = alice.begin_drag(&id, Point::new(1000.0, 600.0)) {
        tracing::error!(error = %e, "drag failed");
        return;
    }
    alice.pointer_move(Point::new(1050.0, 600.0));
    match alice.end_gesture(Point::new(1100.0, 600.0)) {
        Ok(Some(commit)) => tracing::info!(note_id = %commit.id, x = ?commit.patch.x, "drag committed"),
        Ok(None) => tracing::warn!("no gesture to commit"),
        Err(e) => tracing::error!(error = %e, "drag commit failed"),
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    match bob.duplicate_note(&id) {
        Ok(copy) => tracing::info!(source_id = %id, note_id = %copy, "bob duplicated the note"),
        Err(e) => tracing::warn!(error = %e, "duplicate failed"),
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    for view in alice.presence().await {
        let name = view.profile.map_or_else(|| view.user_id.clone(), |p| p.display_name);
        tracing::info!(user = %name, writing = view.is_writing, "present");
    }

    match serde_json::to_string_pretty(&remote.notes(ROOM)) {
        Ok(json) => tracing::info!(snapshot = %json, "final remote snapshot"),
        Err(e) => tracing::error!(error = %e, "snapshot encode failed"),
    }

    alice.leave().await;
    bob.leave().await;
}

fn profile(id: &str, name: &str, color: &str) -> Profile {
    Profile { id: id.into(), display_name: name.into(), avatar_url: None, color: color.into() }
}

async fn wait_confirmed(session: &RoomSession) -> Option<NoteId> {
    for _ in 0..20 {
        if let Some(note) = session.notes().into_iter().find(|n| !n.id.is_temp()) {
            return Some(note.id);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

async fn log_notices(user: &'static str, mut rx: mpsc::Receiver<Notice>) {
    while let Some(notice) = rx.recv().await {
        tracing::warn!(user, code = notice.code, level = ?notice.level, message = %notice.message, "notice");
    }
}
