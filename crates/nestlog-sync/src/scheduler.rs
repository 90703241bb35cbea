//! Periodic pull/push for one joined room.
//!
//! The scheduler pulls once right away, then on a fixed interval. Local
//! mutations push through the same room session. Every operation holds the
//! room's [`SyncSession`], so at most one is in flight; anything arriving
//! while one runs is dropped and the next tick picks up the slack. No error leaves a
//! tick: failures are reported to the replica as a [`SyncStatus`] and the
//! loop carries on without backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nestlog_shared::constants::DEFAULT_SYNC_INTERVAL_SECS;

use crate::client::{FetchOutcome, RemoteDocumentClient};
use crate::error::RemoteError;
use crate::merge::merge;
use crate::replica::{SyncReplica, SyncStatus};
use crate::session::SyncSession;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
        }
    }
}

/// What one sync operation ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another operation was in flight.
    Skipped,
    Pulled { pushed_back: bool },
    Pushed,
    RoomNotFound,
    Failed(String),
}

fn status_for(err: &RemoteError) -> SyncStatus {
    match err {
        RemoteError::Auth { .. } => SyncStatus::AuthError(err.to_string()),
        RemoteError::NotFound(_) => SyncStatus::RoomNotFound,
        _ => SyncStatus::NetworkError(err.to_string()),
    }
}

async fn report_remote_failure(replica: &dyn SyncReplica, err: RemoteError) -> SyncOutcome {
    let status = status_for(&err);
    let outcome = if status == SyncStatus::RoomNotFound {
        SyncOutcome::RoomNotFound
    } else {
        SyncOutcome::Failed(err.to_string())
    };
    replica.report_status(status).await;
    outcome
}

/// Fetch the room, merge it with the freshest local state, hand the result
/// to the replica, and push it back if the replica says so.
pub async fn pull(
    remote: &dyn RemoteDocumentClient,
    replica: &dyn SyncReplica,
    session: &Arc<SyncSession>,
) -> SyncOutcome {
    let Some(guard) = session.try_acquire() else {
        debug!(room = %session.document_id(), "pull skipped, sync in flight");
        return SyncOutcome::Skipped;
    };
    let room = guard.document_id();

    let remote_snapshot = match remote.fetch(room).await {
        Ok(FetchOutcome::Found(snapshot)) => snapshot,
        Ok(FetchOutcome::NotFound) => {
            warn!(room = %room, "room not found");
            replica.report_status(SyncStatus::RoomNotFound).await;
            return SyncOutcome::RoomNotFound;
        }
        Err(e) => {
            warn!(room = %room, error = %e, "pull failed");
            return report_remote_failure(replica, e).await;
        }
    };

    // Read local state only now: mutations made while the fetch was
    // outstanding must not be lost.
    let local_snapshot = replica.local_snapshot().await;
    let merged = merge(&local_snapshot, &remote_snapshot);

    let applied = match replica.apply_merged(merged.clone()).await {
        Ok(applied) => applied,
        Err(e) => {
            warn!(room = %room, error = %e, "could not apply merged state");
            replica
                .report_status(SyncStatus::PersistenceError(e.to_string()))
                .await;
            return SyncOutcome::Failed(e.to_string());
        }
    };

    if applied.push_back {
        let outgoing = merged.with_writer(replica.device_id());
        if let Err(e) = remote.update(room, &outgoing).await {
            warn!(room = %room, error = %e, "push-back failed");
            return report_remote_failure(replica, e).await;
        }
        replica.mark_pushed().await;
    }

    debug!(room = %room, pushed_back = applied.push_back, "pull complete");
    replica
        .report_status(SyncStatus::Synced { at: Utc::now() })
        .await;
    SyncOutcome::Pulled {
        pushed_back: applied.push_back,
    }
}

/// Upload local state with this device as writer, overwriting the room.
pub async fn push(
    remote: &dyn RemoteDocumentClient,
    replica: &dyn SyncReplica,
    session: &Arc<SyncSession>,
) -> SyncOutcome {
    let Some(guard) = session.try_acquire() else {
        debug!(room = %session.document_id(), "push skipped, sync in flight");
        return SyncOutcome::Skipped;
    };
    let room = guard.document_id();

    let snapshot = replica
        .local_snapshot()
        .await
        .with_writer(replica.device_id());

    if let Err(e) = remote.update(room, &snapshot).await {
        warn!(room = %room, error = %e, "push failed");
        return report_remote_failure(replica, e).await;
    }

    replica.mark_pushed().await;
    debug!(room = %room, entries = snapshot.entries.len(), "push complete");
    replica
        .report_status(SyncStatus::Synced { at: Utc::now() })
        .await;
    SyncOutcome::Pushed
}

/// Drives sync for one room until stopped.
pub struct SyncScheduler {
    remote: Arc<dyn RemoteDocumentClient>,
    replica: Arc<dyn SyncReplica>,
    session: Arc<SyncSession>,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    pub fn new(
        remote: Arc<dyn RemoteDocumentClient>,
        replica: Arc<dyn SyncReplica>,
        document_id: impl Into<String>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            remote,
            replica,
            session: SyncSession::new(document_id),
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn document_id(&self) -> &str {
        self.session.document_id()
    }

    pub fn session(&self) -> &Arc<SyncSession> {
        &self.session
    }

    /// Pull once right away, then spawn the loop that pulls once per
    /// interval. Returns the outcome of the immediate pull. Calling it on a
    /// running scheduler does nothing.
    pub async fn start(&mut self) -> SyncOutcome {
        if self.is_running() {
            debug!(room = %self.document_id(), "scheduler already running");
            return SyncOutcome::Skipped;
        }

        info!(
            room = %self.document_id(),
            interval_secs = self.config.interval.as_secs_f64(),
            "starting sync scheduler"
        );
        let outcome = self.pull_now().await;

        self.cancellation_token = CancellationToken::new();
        let remote = Arc::clone(&self.remote);
        let replica = Arc::clone(&self.replica);
        let session = Arc::clone(&self.session);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::sync_loop(remote, replica, session, interval, cancel).await;
        }));

        outcome
    }

    /// Stop scheduling ticks. An operation already in flight runs to
    /// completion; nothing new starts afterwards.
    pub fn stop(&mut self) {
        if self.cancellation_token.is_cancelled() && self.task_handle.is_none() {
            return;
        }
        info!(room = %self.document_id(), "stopping sync scheduler");
        self.cancellation_token.cancel();
        // Detach rather than abort so an in-flight request is not cut off.
        self.task_handle.take();
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
            && self
                .task_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn pull_now(&self) -> SyncOutcome {
        pull(self.remote.as_ref(), self.replica.as_ref(), &self.session).await
    }

    pub async fn push_now(&self) -> SyncOutcome {
        push(self.remote.as_ref(), self.replica.as_ref(), &self.session).await
    }

    async fn sync_loop(
        remote: Arc<dyn RemoteDocumentClient>,
        replica: Arc<dyn SyncReplica>,
        session: Arc<SyncSession>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(room = %session.document_id(), "sync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    pull(remote.as_ref(), replica.as_ref(), &session).await;
                }
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            debug!(room = %self.document_id(), "scheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use nestlog_shared::{
        ActivityEntry, ActivityType, CurrentState, DeviceId, RoomInfo, SyncSnapshot,
    };
    use tokio::sync::Notify;

    use super::*;
    use crate::error::SyncError;
    use crate::replica::MergeApplied;

    fn base_snapshot() -> SyncSnapshot {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        SyncSnapshot {
            entries: Vec::new(),
            current: CurrentState::awake_since(t),
            last_updated: t,
            writer_device_id: None,
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        document: Mutex<Option<SyncSnapshot>>,
        fetches: AtomicUsize,
        updates: AtomicUsize,
        fail_fetch: Mutex<Option<u16>>,
        outage: AtomicBool,
        entered: Notify,
        gate: Option<Notify>,
    }

    impl FakeRemote {
        fn with_document(snapshot: SyncSnapshot) -> Self {
            Self {
                document: Mutex::new(Some(snapshot)),
                ..Self::default()
            }
        }

        fn stored(&self) -> Option<SyncSnapshot> {
            self.document.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteDocumentClient for FakeRemote {
        async fn create(&self, initial: &SyncSnapshot) -> Result<RoomInfo, RemoteError> {
            *self.document.lock().unwrap() = Some(initial.clone());
            Ok(RoomInfo::new("fakeroom1"))
        }

        async fn fetch(&self, _document_id: &str) -> Result<FetchOutcome, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(status) = *self.fail_fetch.lock().unwrap() {
                return Err(RemoteError::Auth { status });
            }
            if self.outage.load(Ordering::SeqCst) {
                return Err(RemoteError::Status {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
            Ok(match self.stored() {
                Some(snapshot) => FetchOutcome::Found(snapshot),
                None => FetchOutcome::NotFound,
            })
        }

        async fn update(
            &self,
            _document_id: &str,
            snapshot: &SyncSnapshot,
        ) -> Result<(), RemoteError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.document.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    struct FakeReplica {
        device: DeviceId,
        state: Mutex<SyncSnapshot>,
        push_back: bool,
        statuses: Mutex<Vec<SyncStatus>>,
        pushes: AtomicUsize,
    }

    impl FakeReplica {
        fn new(device: &str, push_back: bool) -> Self {
            Self {
                device: DeviceId::from_string(device),
                state: Mutex::new(base_snapshot()),
                push_back,
                statuses: Mutex::new(Vec::new()),
                pushes: AtomicUsize::new(0),
            }
        }

        fn last_status(&self) -> Option<SyncStatus> {
            self.statuses.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl SyncReplica for FakeReplica {
        fn device_id(&self) -> DeviceId {
            self.device.clone()
        }

        async fn local_snapshot(&self) -> SyncSnapshot {
            self.state.lock().unwrap().clone()
        }

        async fn apply_merged(&self, merged: SyncSnapshot) -> Result<MergeApplied, SyncError> {
            *self.state.lock().unwrap() = merged;
            Ok(MergeApplied {
                push_back: self.push_back,
            })
        }

        async fn mark_pushed(&self) {
            self.pushes.fetch_add(1, Ordering::SeqCst);
        }

        async fn report_status(&self, status: SyncStatus) {
            self.statuses.lock().unwrap().push(status);
        }
    }

    fn remote_with_entry() -> SyncSnapshot {
        let mut snapshot = base_snapshot();
        let t = snapshot.last_updated;
        snapshot.entries.push(ActivityEntry {
            id: "remote-1".into(),
            kind: ActivityType::Sleeping,
            start_time: t - chrono::Duration::hours(2),
            end_time: Some(t - chrono::Duration::hours(1)),
        });
        snapshot.writer_device_id = Some(DeviceId::from_string("other"));
        snapshot
    }

    #[tokio::test]
    async fn test_pull_merges_and_pushes_back() {
        let remote = FakeRemote::with_document(remote_with_entry());
        let replica = FakeReplica::new("me", true);
        let session = SyncSession::new("room");

        let outcome = pull(&remote, &replica, &session).await;
        assert_eq!(outcome, SyncOutcome::Pulled { pushed_back: true });

        let local = replica.local_snapshot().await;
        assert!(local.entries.iter().any(|e| e.id == "remote-1"));

        let stored = remote.stored().unwrap();
        assert_eq!(stored.writer_device_id, Some(DeviceId::from_string("me")));
        assert_eq!(replica.pushes.load(Ordering::SeqCst), 1);
        assert!(matches!(replica.last_status(), Some(SyncStatus::Synced { .. })));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_pull_without_push_back_leaves_remote_alone() {
        let remote = FakeRemote::with_document(remote_with_entry());
        let replica = FakeReplica::new("me", false);
        let session = SyncSession::new("room");

        let outcome = pull(&remote, &replica, &session).await;
        assert_eq!(outcome, SyncOutcome::Pulled { pushed_back: false });
        assert_eq!(remote.updates.load(Ordering::SeqCst), 0);
        assert_eq!(
            remote.stored().unwrap().writer_device_id,
            Some(DeviceId::from_string("other"))
        );
    }

    #[tokio::test]
    async fn test_pull_room_not_found() {
        let remote = FakeRemote::default();
        let replica = FakeReplica::new("me", true);
        let session = SyncSession::new("gone");

        assert_eq!(
            pull(&remote, &replica, &session).await,
            SyncOutcome::RoomNotFound
        );
        assert_eq!(replica.last_status(), Some(SyncStatus::RoomNotFound));
        assert_eq!(remote.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pull_auth_failure_is_reported_not_raised() {
        let remote = FakeRemote::with_document(base_snapshot());
        *remote.fail_fetch.lock().unwrap() = Some(401);
        let replica = FakeReplica::new("me", true);
        let session = SyncSession::new("room");

        let outcome = pull(&remote, &replica, &session).await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert!(matches!(replica.last_status(), Some(SyncStatus::AuthError(_))));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_push_claims_writer() {
        let remote = FakeRemote::with_document(remote_with_entry());
        let replica = FakeReplica::new("me", true);
        let session = SyncSession::new("room");

        assert_eq!(push(&remote, &replica, &session).await, SyncOutcome::Pushed);
        let stored = remote.stored().unwrap();
        assert_eq!(stored.writer_device_id, Some(DeviceId::from_string("me")));
        // Push overwrites; it does not merge.
        assert!(stored.entries.is_empty());
    }

    #[tokio::test]
    async fn test_second_pull_while_first_in_flight_is_noop() {
        let remote = Arc::new(FakeRemote {
            document: Mutex::new(Some(remote_with_entry())),
            gate: Some(Notify::new()),
            ..FakeRemote::default()
        });
        let replica = Arc::new(FakeReplica::new("me", false));
        let session = SyncSession::new("room");

        let first = {
            let remote = Arc::clone(&remote);
            let replica = Arc::clone(&replica);
            let session = Arc::clone(&session);
            tokio::spawn(async move { pull(remote.as_ref(), replica.as_ref(), &session).await })
        };

        remote.entered.notified().await;
        assert!(session.is_busy());

        let second = pull(remote.as_ref(), replica.as_ref(), &session).await;
        assert_eq!(second, SyncOutcome::Skipped);
        let blocked_push = push(remote.as_ref(), replica.as_ref(), &session).await;
        assert_eq!(blocked_push, SyncOutcome::Skipped);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);

        if let Some(gate) = &remote.gate {
            gate.notify_one();
        }
        let first = first.await.unwrap();
        assert_eq!(first, SyncOutcome::Pulled { pushed_back: false });
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_stopped() {
        let remote = Arc::new(FakeRemote::with_document(base_snapshot()));
        let replica = Arc::new(FakeReplica::new("me", false));
        let mut scheduler = SyncScheduler::new(
            remote.clone(),
            replica.clone(),
            "room",
            SchedulerConfig {
                interval: Duration::from_millis(20),
            },
        );

        let first = scheduler.start().await;
        assert_eq!(first, SyncOutcome::Pulled { pushed_back: false });
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(remote.fetches.load(Ordering::SeqCst) >= 3);

        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_stop = remote.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.fetches.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_start_twice_does_not_pull_again() {
        let remote = Arc::new(FakeRemote::with_document(base_snapshot()));
        let replica = Arc::new(FakeReplica::new("me", false));
        let mut scheduler = SyncScheduler::new(
            remote.clone(),
            replica.clone(),
            "room",
            SchedulerConfig::default(),
        );

        scheduler.start().await;
        assert_eq!(scheduler.start().await, SyncOutcome::Skipped);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);

        scheduler.stop();
        // A stopped scheduler can be started again.
        scheduler.start().await;
        assert!(scheduler.is_running());
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_ticks_keep_loop_running_until_recovery() {
        let remote = Arc::new(FakeRemote::with_document(base_snapshot()));
        remote.outage.store(true, Ordering::SeqCst);
        let replica = Arc::new(FakeReplica::new("me", false));
        let mut scheduler = SyncScheduler::new(
            remote.clone(),
            replica.clone(),
            "room",
            SchedulerConfig {
                interval: Duration::from_millis(20),
            },
        );

        assert!(matches!(scheduler.start().await, SyncOutcome::Failed(_)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(remote.fetches.load(Ordering::SeqCst) >= 3);
        assert!(matches!(
            replica.last_status(),
            Some(SyncStatus::NetworkError(_))
        ));
        assert!(scheduler.is_running());

        remote.outage.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(replica.last_status(), Some(SyncStatus::Synced { .. })));
        assert!(scheduler.is_running());

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_lets_in_flight_pull_finish() {
        let remote = Arc::new(FakeRemote {
            document: Mutex::new(Some(base_snapshot())),
            gate: Some(Notify::new()),
            ..FakeRemote::default()
        });
        let replica = Arc::new(FakeReplica::new("me", false));
        let mut scheduler = SyncScheduler::new(
            remote.clone(),
            replica.clone(),
            "room",
            SchedulerConfig {
                interval: Duration::from_millis(20),
            },
        );
        let gate = remote.gate.as_ref().unwrap();

        // Let the immediate pull through; the first tick then blocks.
        gate.notify_one();
        scheduler.start().await;
        *remote.document.lock().unwrap() = Some(remote_with_entry());
        while remote.fetches.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(scheduler.session().is_busy());

        scheduler.stop();
        gate.notify_one();
        for _ in 0..100 {
            if !scheduler.session().is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(!scheduler.session().is_busy());
        let local = replica.local_snapshot().await;
        assert!(local.entries.iter().any(|e| e.id == "remote-1"));
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 2);
    }
}
