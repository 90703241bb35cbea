//! Application state shared by commands, the sync replica and the alert loop.
//!
//! [`AppState`] sits behind a `std::sync::Mutex`. The lock is never held
//! across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use nestlog_shared::{DeviceId, RoomInfo};
use nestlog_store::{Database, NotificationSettings};
use nestlog_sync::{SyncStatus, WriterArbiter};

use crate::log::{ActivityCommand, ActivityLog};

pub type SharedState = Arc<Mutex<AppState>>;

pub struct AppState {
    /// The activity log and its open span. Authoritative in memory; the
    /// database copy may lag after a persistence failure.
    pub log: ActivityLog,

    /// Local key-value store.
    pub database: Database,

    /// This install's stable id.
    pub device_id: DeviceId,

    /// The joined room, if any.
    pub room: Option<RoomInfo>,

    pub arbiter: WriterArbiter<ActivityCommand>,

    pub sync_status: SyncStatus,

    pub notification_settings: NotificationSettings,
}

impl AppState {
    /// Load everything from `database`, starting a fresh log if none is
    /// stored.
    pub fn load(database: Database, now: DateTime<Utc>) -> nestlog_store::Result<Self> {
        let device_id = database.device_id()?;
        let (log, fresh) = ActivityLog::restore(database.load_tracker_data()?, now);
        if fresh {
            database.save_tracker_data(&log.to_data())?;
            info!("Started a new activity log");
        }
        let room = database.load_room()?;
        let notification_settings = database.load_notification_settings()?;

        Ok(Self {
            log,
            arbiter: WriterArbiter::new(device_id.clone()),
            database,
            device_id,
            room,
            sync_status: SyncStatus::Idle,
            notification_settings,
        })
    }

    pub fn persist_log(&self) -> nestlog_store::Result<()> {
        self.database.save_tracker_data(&self.log.to_data())
    }

    /// Forget everything learned about the current room's writer.
    pub fn reset_arbiter(&mut self) {
        self.arbiter = WriterArbiter::new(self.device_id.clone());
    }
}

/// Lock the shared state. A poisoned lock is recovered: the state is plain
/// data and every mutation persists before returning.
pub fn lock_state(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!("State lock was poisoned, recovering");
        poisoned.into_inner()
    })
}
