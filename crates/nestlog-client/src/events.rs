use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use nestlog_shared::{ActivityType, DeviceId, RoomInfo};

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TrackerEvent {
    StateChanged {
        activity: ActivityType,
        since: DateTime<Utc>,
        entries: usize,
    },
    TakeoverRequested {
        current_writer: DeviceId,
    },
    SyncStatusChanged {
        message: String,
        is_error: bool,
    },
    RoomChanged {
        room: Option<RoomInfo>,
    },
    Alert {
        title: String,
        body: String,
        tag: String,
    },
}

pub type EventSender = broadcast::Sender<TrackerEvent>;

pub fn channel() -> EventSender {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

pub fn emit_event(events: &EventSender, event: TrackerEvent) {
    // Sending only fails when nobody is listening, which is the normal case
    // for one-shot commands.
    if let Err(e) = events.send(event) {
        tracing::trace!(event = ?e.0, "No event subscribers");
    }
}
