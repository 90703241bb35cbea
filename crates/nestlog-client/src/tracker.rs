//! The [`Tracker`] ties the shared state to the remote room.
//!
//! Operations are grouped by domain in `commands/` as further `impl Tracker`
//! blocks; this file holds construction, status and the sync plumbing.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use nestlog_shared::{ActivityType, DeviceId, RoomInfo};
use nestlog_store::Database;
use nestlog_sync::{
    push, RemoteDocumentClient, SchedulerConfig, SyncOutcome, SyncScheduler, SyncSession,
    WriterRole,
};

use crate::error::Result;
use crate::events::{self, EventSender, TrackerEvent};
use crate::replica::LocalReplica;
use crate::state::{lock_state, AppState, SharedState};

/// Point-in-time view for display.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub activity: ActivityType,
    pub since: DateTime<Utc>,
    pub elapsed_secs: i64,
    pub entries: usize,
    pub device_id: DeviceId,
    pub room: Option<RoomInfo>,
    pub writer: Option<DeviceId>,
    pub role: &'static str,
    pub decision_pending: bool,
    pub sync_message: String,
    pub sync_error: bool,
}

pub struct Tracker {
    pub(crate) state: SharedState,
    pub(crate) replica: Arc<LocalReplica>,
    pub(crate) remote: Arc<dyn RemoteDocumentClient>,
    scheduler: Mutex<Option<SyncScheduler>>,
    /// Session of the joined room. Set before the scheduler's first pull so
    /// mutations made meanwhile see the room.
    session: Mutex<Option<Arc<SyncSession>>>,
    scheduler_config: SchedulerConfig,
    pub(crate) events: EventSender,
}

impl Tracker {
    pub fn new(
        database: Database,
        remote: Arc<dyn RemoteDocumentClient>,
        scheduler_config: SchedulerConfig,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(AppState::load(database, Utc::now())?));
        let events = events::channel();
        let replica = Arc::new(LocalReplica::new(Arc::clone(&state), events.clone()));

        Ok(Self {
            state,
            replica,
            remote,
            scheduler: Mutex::new(None),
            session: Mutex::new(None),
            scheduler_config,
            events,
        })
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn device_id(&self) -> DeviceId {
        lock_state(&self.state).device_id.clone()
    }

    pub fn status(&self, now: DateTime<Utc>) -> TrackerStatus {
        let state = lock_state(&self.state);
        let current = state.log.current();
        TrackerStatus {
            activity: current.activity_type(),
            since: current.start_time,
            elapsed_secs: state.log.elapsed_secs(now),
            entries: state.log.entries().len(),
            device_id: state.device_id.clone(),
            room: state.room.clone(),
            writer: state.arbiter.writer_on_record().cloned(),
            role: match state.arbiter.role() {
                WriterRole::Writer => "writer",
                WriterRole::ReadOnly => "read-only",
                WriterRole::Unclaimed => "unclaimed",
            },
            decision_pending: state.arbiter.decision_pending(),
            sync_message: state.sync_status.message(),
            sync_error: state.sync_status.is_error(),
        }
    }

    // -----------------------------------------------------------------------
    // Sync plumbing
    // -----------------------------------------------------------------------

    /// Start syncing the room saved by a previous run, if any.
    pub async fn resume(&self) -> Option<SyncOutcome> {
        let room = lock_state(&self.state).room.clone()?;
        info!(room = %room.document_id, code = %room.human_code, "Resuming room sync");
        Some(self.start_sync(&room).await)
    }

    pub fn is_syncing(&self) -> bool {
        self.lock_scheduler()
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    /// Pull now, outside the schedule. `None` when no room is joined.
    pub async fn sync_now(&self) -> Option<SyncOutcome> {
        let session = self.session()?;
        Some(nestlog_sync::pull(self.remote.as_ref(), self.replica.as_ref(), &session).await)
    }

    /// Push local state now. `None` when no room is joined.
    pub async fn push_now(&self) -> Option<SyncOutcome> {
        let session = self.session()?;
        Some(push(self.remote.as_ref(), self.replica.as_ref(), &session).await)
    }

    /// Replace any running scheduler with one for `room` and run its
    /// immediate pull.
    pub(crate) async fn start_sync(&self, room: &RoomInfo) -> SyncOutcome {
        self.stop_sync();

        let mut scheduler = SyncScheduler::new(
            Arc::clone(&self.remote),
            self.replica.clone(),
            room.document_id.clone(),
            self.scheduler_config.clone(),
        );
        let session = Arc::clone(scheduler.session());
        *lock(&self.session) = Some(Arc::clone(&session));

        let outcome = scheduler.start().await;
        debug!(room = %room.document_id, ?outcome, "Initial pull done");

        // The room may have been left while the first pull was out.
        let still_current = lock(&self.session)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &session));
        if still_current {
            *self.lock_scheduler() = Some(scheduler);
        } else {
            scheduler.stop();
        }
        outcome
    }

    pub(crate) fn stop_sync(&self) {
        lock(&self.session).take();
        if let Some(mut scheduler) = self.lock_scheduler().take() {
            scheduler.stop();
        }
    }

    fn session(&self) -> Option<Arc<SyncSession>> {
        lock(&self.session).clone()
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Option<SyncScheduler>> {
        lock(&self.scheduler)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
