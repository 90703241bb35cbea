use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nestlog_shared::{DeviceId, SyncSnapshot};

use crate::error::SyncError;

/// What the local side did with a merged snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeApplied {
    /// The merged state should be pushed back to the room.
    pub push_back: bool,
}

/// Sync health shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Synced {
        at: DateTime<Utc>,
    },
    RoomNotFound,
    AuthError(String),
    NetworkError(String),
    PersistenceError(String),
}

impl SyncStatus {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Idle | Self::Synced { .. })
    }

    /// Short user-facing message for the status line.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => "Not synced yet".to_string(),
            Self::Synced { at } => format!("Synced at {}", at.format("%H:%M:%S")),
            Self::RoomNotFound => "Room not found. It may have been deleted.".to_string(),
            Self::AuthError(detail) => format!("API key rejected: {detail}"),
            Self::NetworkError(detail) => format!("Sync failed: {detail}"),
            Self::PersistenceError(detail) => format!("Could not save locally: {detail}"),
        }
    }
}

/// The local half of a sync cycle: where snapshots come from and where
/// merged results go. The scheduler never touches local state any other way.
#[async_trait]
pub trait SyncReplica: Send + Sync {
    fn device_id(&self) -> DeviceId;

    /// The freshest local state, read at call time. Carries the last writer
    /// id this device has seen.
    async fn local_snapshot(&self) -> SyncSnapshot;

    /// Adopt a merged snapshot, persist it, and report whether it should be
    /// pushed back.
    async fn apply_merged(&self, merged: SyncSnapshot) -> Result<MergeApplied, SyncError>;

    /// A push by this device landed.
    async fn mark_pushed(&self);

    async fn report_status(&self, status: SyncStatus);
}
