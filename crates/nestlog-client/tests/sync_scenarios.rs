//! Two devices sharing one room through an in-memory document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use nestlog_client::state::lock_state;
use nestlog_client::{ClientError, CommandOutcome, TakeoverResolution, Tracker, TrackerEvent};
use nestlog_shared::room_code::RoomRef;
use nestlog_shared::{ActivityType, RoomInfo, SyncSnapshot};
use nestlog_store::Database;
use nestlog_sync::{
    FetchOutcome, RemoteDocumentClient, RemoteError, SchedulerConfig, SyncOutcome,
};

#[derive(Default)]
struct MemoryRemote {
    documents: Mutex<HashMap<String, SyncSnapshot>>,
    next_id: AtomicUsize,
}

impl MemoryRemote {
    fn document(&self, id: &str) -> Option<SyncSnapshot> {
        self.documents.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl RemoteDocumentClient for MemoryRemote {
    async fn create(&self, initial: &SyncSnapshot) -> Result<RoomInfo, RemoteError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("65f0c0ffee{n:010}");
        self.documents
            .lock()
            .unwrap()
            .insert(id.clone(), initial.clone());
        Ok(RoomInfo::new(id))
    }

    async fn fetch(&self, document_id: &str) -> Result<FetchOutcome, RemoteError> {
        Ok(match self.document(document_id) {
            Some(snapshot) => FetchOutcome::Found(snapshot),
            None => FetchOutcome::NotFound,
        })
    }

    async fn update(&self, document_id: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError> {
        let mut documents = self.documents.lock().unwrap();
        match documents.get_mut(document_id) {
            Some(doc) => {
                *doc = snapshot.clone();
                Ok(())
            }
            None => Err(RemoteError::NotFound(document_id.to_string())),
        }
    }
}

fn device(remote: &Arc<MemoryRemote>) -> Tracker {
    Tracker::new(
        Database::open_in_memory().unwrap(),
        remote.clone(),
        // Long enough that no background tick fires during a test.
        SchedulerConfig {
            interval: std::time::Duration::from_secs(3600),
        },
    )
    .unwrap()
}

fn entry_count(tracker: &Tracker) -> usize {
    lock_state(tracker.state()).log.entries().len()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// X creates a room with one closed entry, Y joins it.
async fn shared_room(remote: &Arc<MemoryRemote>) -> (Tracker, Tracker, RoomInfo) {
    let x = device(remote);
    x.toggle_sleep_awake().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    x.toggle_sleep_awake().await.unwrap();
    let room = x.create_room().await.unwrap();

    let y = device(remote);
    let (joined, outcome) = y
        .join_room(&RoomRef::DocumentId(room.document_id.clone()))
        .await
        .unwrap();
    assert_eq!(joined, room);
    assert_eq!(outcome, SyncOutcome::Pulled { pushed_back: false });

    (x, y, room)
}

#[tokio::test]
async fn test_creator_is_writer_of_new_room() {
    let remote = Arc::new(MemoryRemote::default());
    let x = device(&remote);
    let room = x.create_room().await.unwrap();

    let stored = remote.document(&room.document_id).unwrap();
    assert_eq!(stored.writer_device_id, Some(x.device_id()));
    assert_eq!(x.status(chrono::Utc::now()).role, "writer");
    assert!(x.is_syncing());
}

#[tokio::test]
async fn test_join_adopts_room_entries() {
    let remote = Arc::new(MemoryRemote::default());
    let (x, y, _room) = shared_room(&remote).await;

    assert_eq!(entry_count(&x), 2);
    assert_eq!(entry_count(&y), 2);

    let ids = |t: &Tracker| -> Vec<String> {
        lock_state(t.state())
            .log
            .entries()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    };
    assert_eq!(ids(&x), ids(&y));
}

#[tokio::test]
async fn test_joining_device_sees_takeover_prompt() {
    let remote = Arc::new(MemoryRemote::default());
    let x = device(&remote);
    let room = x.create_room().await.unwrap();

    let y = device(&remote);
    let mut events = y.subscribe();
    y.join_room(&RoomRef::DocumentId(room.document_id.clone()))
        .await
        .unwrap();

    let events = drain(&mut events);
    assert!(events.contains(&TrackerEvent::TakeoverRequested {
        current_writer: x.device_id()
    }));
    // No push-back while the decision is open: X is still writer.
    let stored = remote.document(&room.document_id).unwrap();
    assert_eq!(stored.writer_device_id, Some(x.device_id()));
}

#[tokio::test]
async fn test_toggle_on_non_writer_is_buffered_until_accepted() {
    let remote = Arc::new(MemoryRemote::default());
    let (x, y, room) = shared_room(&remote).await;
    let before = entry_count(&y);

    let outcome = y.toggle_sleep_awake().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::AwaitingTakeover {
            current_writer: x.device_id()
        }
    );
    assert_eq!(entry_count(&y), before);
    assert_eq!(
        remote.document(&room.document_id).unwrap().writer_device_id,
        Some(x.device_id())
    );

    let resolution = y.resolve_takeover(true).await.unwrap();
    match resolution {
        TakeoverResolution::Accepted { claim, applied } => {
            assert_eq!(claim, Some(SyncOutcome::Pushed));
            assert!(applied.is_some());
        }
        other => panic!("expected accept, got {other:?}"),
    }

    let stored = remote.document(&room.document_id).unwrap();
    assert_eq!(stored.writer_device_id, Some(y.device_id()));
    assert_eq!(stored.entries.len(), before + 1);
    assert_eq!(stored.current.activity, ActivityType::Sleeping);
    assert_eq!(y.status(chrono::Utc::now()).role, "writer");
}

#[tokio::test]
async fn test_decline_leaves_room_untouched() {
    let remote = Arc::new(MemoryRemote::default());
    let (x, y, room) = shared_room(&remote).await;
    let stored_before = remote.document(&room.document_id).unwrap();

    y.toggle_eating().await.unwrap();
    let resolution = y.resolve_takeover(false).await.unwrap();
    assert!(matches!(
        resolution,
        TakeoverResolution::Declined { discarded: Some(_) }
    ));
    assert!(!lock_state(y.state()).log.current().eating);
    assert_eq!(y.status(chrono::Utc::now()).role, "read-only");

    // A read-only pull does not push back.
    assert_eq!(
        y.sync_now().await,
        Some(SyncOutcome::Pulled { pushed_back: false })
    );
    let stored = remote.document(&room.document_id).unwrap();
    assert_eq!(stored, stored_before);
    assert_eq!(stored.writer_device_id, Some(x.device_id()));
}

#[tokio::test]
async fn test_previous_writer_notices_takeover() {
    let remote = Arc::new(MemoryRemote::default());
    let (x, y, _room) = shared_room(&remote).await;

    y.toggle_sleep_awake().await.unwrap();
    y.resolve_takeover(true).await.unwrap();

    let mut events = x.subscribe();
    x.sync_now().await;
    assert!(drain(&mut events).contains(&TrackerEvent::TakeoverRequested {
        current_writer: y.device_id()
    }));

    // X's next toggle now waits for its own decision.
    assert!(matches!(
        x.toggle_sleep_awake().await.unwrap(),
        CommandOutcome::AwaitingTakeover { .. }
    ));
}

#[tokio::test]
async fn test_writer_mutations_reach_other_device() {
    let remote = Arc::new(MemoryRemote::default());
    let (x, y, _room) = shared_room(&remote).await;

    let outcome = x.toggle_eating().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Applied {
            sync: Some(SyncOutcome::Pushed)
        }
    );

    y.sync_now().await;
    assert_eq!(entry_count(&y), entry_count(&x));
}

#[tokio::test]
async fn test_join_missing_room_fails() {
    let remote = Arc::new(MemoryRemote::default());
    let y = device(&remote);

    let err = y
        .join_room(&RoomRef::parse("ZZZ-999").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::RoomNotFound(id) if id == "zzz999"));
    assert!(y.room().is_none());
    assert!(!y.is_syncing());
}

#[tokio::test]
async fn test_leave_room_stops_sync_and_resets_writer() {
    let remote = Arc::new(MemoryRemote::default());
    let (_x, y, _room) = shared_room(&remote).await;

    y.leave_room().unwrap();
    assert!(y.room().is_none());
    assert!(!y.is_syncing());
    assert_eq!(y.sync_now().await, None);
    assert_eq!(y.status(chrono::Utc::now()).role, "unclaimed");

    // Without a room, mutations apply immediately.
    assert_eq!(
        y.toggle_sleep_awake().await.unwrap(),
        CommandOutcome::Applied { sync: None }
    );
    assert!(matches!(y.leave_room(), Err(ClientError::NoRoom)));
}

#[tokio::test]
async fn test_room_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nestlog.db");
    let remote = Arc::new(MemoryRemote::default());

    let room = {
        let x = Tracker::new(
            Database::open_at(&path).unwrap(),
            remote.clone(),
            SchedulerConfig::default(),
        )
        .unwrap();
        x.create_room().await.unwrap()
    };

    let reopened = Tracker::new(
        Database::open_at(&path).unwrap(),
        remote.clone(),
        SchedulerConfig::default(),
    )
    .unwrap();
    assert_eq!(reopened.room(), Some(room));
    assert!(matches!(
        reopened.resume().await,
        Some(SyncOutcome::Pulled { .. })
    ));
    assert!(reopened.is_syncing());
}
