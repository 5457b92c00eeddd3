//! End-to-end scenarios: two sessions sharing one in-memory remote.
#![allow(clippy::float_cmp)]

use std::time::Duration;

use noteroom::config::SyncConfig;
use noteroom::consts::{DEFAULT_IMAGE_WIDTH, DEFAULT_NOTE_HEIGHT};
use noteroom::gesture::{Camera, Point};
use noteroom::identity::{Profile, StaticProfiles};
use noteroom::note::{NoteContent, NoteId, NoteKind, NotePatch};
use noteroom::notice::{Notice, NoticeLevel};
use noteroom::remote::InMemoryRemote;
use noteroom::remote::memory::RemoteOp;
use noteroom::room::{Collaborators, RoomSession};
use noteroom::upload::InMemoryUploader;
use tokio::sync::mpsc;

const ROOM: &str = "board-1";

struct Peer {
    session: RoomSession,
    notices: mpsc::Receiver<Notice>,
}

fn profiles() -> StaticProfiles {
    let profile = |id: &str, name: &str| Profile {
        id: id.into(),
        display_name: name.into(),
        avatar_url: None,
        color: "#000000".into(),
    };
    StaticProfiles::new().with(profile("alice", "Alice")).with(profile("bob", "Bob"))
}

async fn join(remote: &InMemoryRemote, user: &str) -> Peer {
    let uploader = InMemoryUploader::new();
    let (session, notices) = RoomSession::new(
        ROOM,
        user,
        Collaborators::in_memory(remote, &uploader, profiles()),
        SyncConfig::default(),
    );
    session.enter().await;
    settle().await;
    Peer { session, notices }
}

async fn pair() -> (InMemoryRemote, Peer, Peer) {
    let remote = InMemoryRemote::new();
    let alice = join(&remote, "alice").await;
    let bob = join(&remote, "bob").await;
    (remote, alice, bob)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn past_debounce() {
    tokio::time::sleep(SyncConfig::default().debounce + Duration::from_millis(50)).await;
}

/// Create a note and wait for the remote id to come back.
async fn create_confirmed(peer: &Peer, kind: NoteKind, x: f64, y: f64, content: Option<NoteContent>) -> NoteId {
    let before: Vec<NoteId> = peer.session.notes().into_iter().map(|n| n.id).collect();
    peer.session.create_note(kind, x, y, content).unwrap();
    settle().await;
    peer.session
        .notes()
        .into_iter()
        .map(|n| n.id)
        .find(|id| !id.is_temp() && !before.contains(id))
        .expect("create was confirmed")
}

fn remote_id(id: &NoteId) -> &str {
    id.remote_id().expect("confirmed id")
}

// =============================================================================
// GESTURES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn drag_at_double_zoom_moves_half_the_screen_distance() {
    let (remote, alice, bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Text, 500.0, 300.0, None).await;

    alice.session.set_camera(Camera::new(0.0, 0.0, 2.0));
    alice.session.begin_drag(&id, Point::new(1000.0, 600.0)).unwrap();
    alice.session.pointer_move(Point::new(1040.0, 600.0));
    alice.session.end_gesture(Point::new(1100.0, 600.0)).unwrap();
    settle().await;

    let stored = remote.note(ROOM, remote_id(&id)).unwrap();
    assert_eq!((stored.x, stored.y), (550.0, 300.0));
    assert_eq!(bob.session.note(&id).unwrap().x, 550.0);
    assert_eq!(alice.session.note(&id).unwrap().x, 550.0);
}

#[tokio::test(start_paused = true)]
async fn zero_distance_drag_commits_the_original_position() {
    let (remote, alice, _bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Todo, 500.0, 300.0, None).await;

    alice.session.set_camera(Camera::new(-37.5, 12.25, 1.7));
    alice.session.begin_drag(&id, Point::new(321.0, 123.0)).unwrap();
    alice.session.pointer_move(Point::new(400.0, 180.0));
    alice.session.end_gesture(Point::new(321.0, 123.0)).unwrap();
    settle().await;

    let updates = remote.updates_for(remote_id(&id));
    assert_eq!(updates, vec![NotePatch::position(500.0, 300.0)]);
}

#[tokio::test(start_paused = true)]
async fn resizing_an_image_follows_the_dominant_axis() {
    let (remote, alice, _bob) = pair().await;
    let url = NoteContent::Image("memory://board-1/cat.png".into());
    let id = create_confirmed(&alice, NoteKind::Image, 0.0, 0.0, Some(url)).await;

    alice.session.begin_resize(&id, Point::new(0.0, 0.0)).unwrap();
    alice.session.end_gesture(Point::new(120.0, 40.0)).unwrap();
    settle().await;
    assert_eq!(alice.session.note(&id).unwrap().width, DEFAULT_IMAGE_WIDTH + 120.0);

    alice.session.begin_resize(&id, Point::new(0.0, 0.0)).unwrap();
    alice.session.end_gesture(Point::new(10.0, -60.0)).unwrap();
    settle().await;

    let stored = remote.note(ROOM, remote_id(&id)).unwrap();
    assert_eq!(stored.width, DEFAULT_IMAGE_WIDTH + 60.0);
    assert!(stored.height.is_none());
}

#[tokio::test(start_paused = true)]
async fn resizing_a_text_note_changes_height_only() {
    let (remote, alice, _bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Text, 0.0, 0.0, None).await;
    let width = alice.session.note(&id).unwrap().width;

    alice.session.begin_resize(&id, Point::new(0.0, 0.0)).unwrap();
    alice.session.end_gesture(Point::new(200.0, 50.0)).unwrap();
    settle().await;

    let stored = remote.note(ROOM, remote_id(&id)).unwrap();
    assert_eq!(stored.height, Some(DEFAULT_NOTE_HEIGHT + 50.0));
    assert_eq!(stored.width, width);
}

// =============================================================================
// EDITS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn rapid_typing_reaches_the_other_peer_as_one_write() {
    let (remote, alice, bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Text, 0.0, 0.0, None).await;

    alice.session.focus_field(&id).await.unwrap();
    let mut text = String::new();
    for ch in "grocery list".chars() {
        text.push(ch);
        alice
            .session
            .edit_note(&id, NotePatch::content(NoteContent::Text(text.clone())))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(remote.updates_for(remote_id(&id)).is_empty());

    past_debounce().await;
    alice.session.blur_field(&id).await;
    settle().await;

    let updates = remote.updates_for(remote_id(&id));
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].content, Some(NoteContent::Text("grocery list".into())));
    assert_eq!(bob.session.note(&id).unwrap().content, NoteContent::Text("grocery list".into()));
}

#[tokio::test(start_paused = true)]
async fn concurrent_titles_converge_on_the_last_write() {
    let (remote, alice, bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Text, 0.0, 0.0, None).await;

    alice.session.focus_field(&id).await.unwrap();
    bob.session.focus_field(&id).await.unwrap();
    alice.session.edit_note(&id, NotePatch::title("Alice's plan")).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    bob.session.edit_note(&id, NotePatch::title("Bob's plan")).unwrap();

    past_debounce().await;
    // Both writes landed; while focused, alice still sees her own text.
    assert_eq!(remote.note(ROOM, remote_id(&id)).unwrap().title, "Bob's plan");
    assert_eq!(alice.session.note(&id).unwrap().title, "Alice's plan");

    alice.session.blur_field(&id).await;
    bob.session.blur_field(&id).await;
    settle().await;

    assert_eq!(alice.session.note(&id).unwrap().title, "Bob's plan");
    assert_eq!(bob.session.note(&id).unwrap().title, "Bob's plan");
}

#[tokio::test(start_paused = true)]
async fn duplicate_by_another_peer_lands_offset_on_both_views() {
    let (_remote, alice, bob) = pair().await;
    let id = create_confirmed(&alice, NoteKind::Text, 100.0, 100.0, None).await;
    alice.session.update_note(&id, NotePatch::title("Original")).unwrap();
    settle().await;

    bob.session.duplicate_note(&id).unwrap();
    settle().await;

    let copies: Vec<_> = alice.session.notes().into_iter().filter(|n| n.id != id).collect();
    assert_eq!(copies.len(), 1);
    assert_eq!((copies[0].x, copies[0].y), (120.0, 120.0));
    assert_eq!(copies[0].title, "Original");
    assert_eq!(copies[0].author_id, "bob");
}

#[tokio::test(start_paused = true)]
async fn failed_create_is_rolled_back_and_never_reaches_peers() {
    let (remote, mut alice, bob) = pair().await;
    remote.fail_next(RemoteOp::CreateNote, 1);

    alice.session.create_note(NoteKind::Text, 10.0, 10.0, None).unwrap();
    assert_eq!(alice.session.notes().len(), 1);
    settle().await;

    assert!(alice.session.notes().is_empty());
    assert!(bob.session.notes().is_empty());
    let notice = alice.notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert_eq!(notice.code, "E_NETWORK");
}

// =============================================================================
// PRESENCE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn peers_see_each_other_typing_and_leaving() {
    let (remote, alice, bob) = pair().await;
    assert_eq!(remote.presence(ROOM).len(), 2);

    let id = create_confirmed(&alice, NoteKind::Text, 0.0, 0.0, None).await;
    bob.session.focus_field(&id).await.unwrap();
    settle().await;

    let views = alice.session.presence().await;
    let bob_view = views.iter().find(|v| v.user_id == "bob").unwrap();
    assert!(bob_view.is_writing);
    assert_eq!(bob_view.profile.as_ref().unwrap().display_name, "Bob");

    bob.session.leave().await;
    alice.session.leave().await;
    assert!(remote.presence(ROOM).is_empty());
}
