use super::*;
use crate::note::NoteContent;

const ROOM: &str = "room-1";

fn draft(x: f64, y: f64) -> Note {
    Note::new(NoteId::temp(), NoteContent::Text("hi".into()), x, y, "alice", 1)
}

#[tokio::test]
async fn create_assigns_confirmed_id_and_broadcasts() {
    let remote = InMemoryRemote::new();
    let mut sub = remote.subscribe_notes(ROOM).await.unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap().len(), 0);

    let id = remote.create_note(ROOM, &draft(1.0, 2.0)).await.unwrap();
    let snapshot = sub.next().await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, NoteId::confirmed(id.clone()));
    assert_eq!(remote.note(ROOM, &id).unwrap().title, "");
}

#[tokio::test]
async fn update_missing_note_is_not_found() {
    let remote = InMemoryRemote::new();
    let err = remote
        .update_note(ROOM, "ghost", &NotePatch::title("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound { what: "note", .. }));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn update_is_last_write_wins() {
    let remote = InMemoryRemote::new();
    let id = remote.create_note(ROOM, &draft(0.0, 0.0)).await.unwrap();
    remote
        .update_note(ROOM, &id, &NotePatch::title("first"))
        .await
        .unwrap();
    remote
        .update_note(ROOM, &id, &NotePatch::title("second"))
        .await
        .unwrap();
    assert_eq!(remote.note(ROOM, &id).unwrap().title, "second");
    assert_eq!(remote.updates_for(&id).len(), 2);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let remote = InMemoryRemote::new();
    let id = remote.create_note(ROOM, &draft(0.0, 0.0)).await.unwrap();
    remote.delete_note(ROOM, &id).await.unwrap();
    remote.delete_note(ROOM, &id).await.unwrap();
    assert!(remote.notes(ROOM).is_empty());
}

#[tokio::test]
async fn injected_failure_fires_once() {
    let remote = InMemoryRemote::new();
    remote.fail_next(RemoteOp::CreateNote, 1);
    let err = remote.create_note(ROOM, &draft(0.0, 0.0)).await.unwrap_err();
    assert!(matches!(err, SyncError::Network { op: "create note", .. }));
    assert!(remote.create_note(ROOM, &draft(0.0, 0.0)).await.is_ok());
}

#[tokio::test]
async fn channel_error_is_delivered_in_band() {
    let remote = InMemoryRemote::new();
    let mut sub = remote.subscribe_notes(ROOM).await.unwrap();
    sub.next().await.unwrap().unwrap();
    remote.inject_channel_error(ROOM);
    assert!(sub.next().await.unwrap().is_err());
}

#[tokio::test]
async fn closing_subscriptions_ends_streams() {
    let remote = InMemoryRemote::new();
    let mut sub = remote.subscribe_notes(ROOM).await.unwrap();
    sub.next().await.unwrap().unwrap();
    remote.close_subscriptions(ROOM);
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn presence_join_then_leave_leaves_no_entry() {
    let remote = InMemoryRemote::new();
    remote.join_presence(ROOM, "alice").await.unwrap();
    remote.join_presence(ROOM, "alice").await.unwrap();
    assert_eq!(remote.presence(ROOM).len(), 1);
    remote.leave_presence(ROOM, "alice").await.unwrap();
    assert!(remote.presence(ROOM).is_empty());
}

#[tokio::test]
async fn set_typing_without_entry_is_not_found() {
    let remote = InMemoryRemote::new();
    let err = remote.set_typing(ROOM, "bob", true).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound { what: "presence", .. }));
}

#[tokio::test]
async fn set_typing_updates_flag() {
    let remote = InMemoryRemote::new();
    remote.join_presence(ROOM, "bob").await.unwrap();
    remote.set_typing(ROOM, "bob", true).await.unwrap();
    let records = remote.presence(ROOM);
    assert!(records[0].is_writing);
}

#[tokio::test(start_paused = true)]
async fn latency_delays_the_call() {
    let remote = InMemoryRemote::new();
    remote.set_latency(Duration::from_millis(300));
    let started = tokio::time::Instant::now();
    remote.create_note(ROOM, &draft(0.0, 0.0)).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn rooms_are_isolated() {
    let remote = InMemoryRemote::new();
    remote.create_note("a", &draft(0.0, 0.0)).await.unwrap();
    assert_eq!(remote.notes("a").len(), 1);
    assert!(remote.notes("b").is_empty());
}
