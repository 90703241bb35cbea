//! Blobs persisted in the key-value table.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase keys so
//! the stored JSON matches the shape used on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nestlog_shared::constants::{DEFAULT_AWAKE_ALERT_MINUTES, DEFAULT_SLEEP_ALERT_MINUTES};
use nestlog_shared::{ActivityEntry, CurrentState};

// ---------------------------------------------------------------------------
// Tracker data
// ---------------------------------------------------------------------------

/// The activity log and its open span, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerData {
    #[serde(default)]
    pub entries: Vec<ActivityEntry>,
    #[serde(flatten)]
    pub current: CurrentState,
    /// Local last-modification time. Older blobs do not carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Notification settings
// ---------------------------------------------------------------------------

/// Elapsed-time alert thresholds. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    /// Alert when the baby has been awake for this long.
    pub awake_alert_minutes: u32,
    /// Alert when the baby has been asleep for this long.
    pub sleep_alert_minutes: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            awake_alert_minutes: DEFAULT_AWAKE_ALERT_MINUTES,
            sleep_alert_minutes: DEFAULT_SLEEP_ALERT_MINUTES,
        }
    }
}
