use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::DeviceId;
use crate::room_code;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Sleeping,
    Awake,
    Eating,
}

impl ActivityType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sleeping => "sleeping",
            Self::Awake => "awake",
            Self::Eating => "eating",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sleeping" | "sleep" => Ok(Self::Sleeping),
            "awake" => Ok(Self::Awake),
            "eating" | "eat" => Ok(Self::Eating),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

/// One span of a single activity. Entries in the log are always closed;
/// the open span lives in [`CurrentState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ActivityEntry {
    /// Create a closed entry with a fresh id.
    pub fn closed(kind: ActivityType, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            start_time,
            end_time: Some(end_time),
        }
    }

    /// Length of a closed entry in whole seconds, `None` while open.
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds())
    }

    /// First 8 characters of the id, for listings. Ids come from remote
    /// documents and are not guaranteed to be ASCII.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// The open span: what the baby is doing right now and since when.
///
/// `activity` is the base state (sleeping or awake); `eating` overrides it
/// for display and for the type of the entry written when the span closes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentState {
    #[serde(rename = "currentActivity")]
    pub activity: ActivityType,
    #[serde(rename = "isEating", default)]
    pub eating: bool,
    #[serde(rename = "currentEntryStartTime")]
    pub start_time: DateTime<Utc>,
}

impl CurrentState {
    pub fn awake_since(start_time: DateTime<Utc>) -> Self {
        Self {
            activity: ActivityType::Awake,
            eating: false,
            start_time,
        }
    }

    /// Display type of the open span.
    pub fn activity_type(&self) -> ActivityType {
        if self.eating {
            ActivityType::Eating
        } else {
            self.activity
        }
    }
}

/// The unit exchanged with a room's remote document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    #[serde(default)]
    pub entries: Vec<ActivityEntry>,
    #[serde(flatten)]
    pub current: CurrentState,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_device_id: Option<DeviceId>,
}

impl SyncSnapshot {
    /// Same snapshot, stamped with `device` as the writer.
    pub fn with_writer(mut self, device: DeviceId) -> Self {
        self.writer_device_id = Some(device);
        self
    }
}

/// A joined room: the canonical document id plus its display code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub document_id: String,
    pub human_code: String,
}

impl RoomInfo {
    pub fn new(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let human_code = room_code::encode(&document_id);
        Self {
            document_id,
            human_code,
        }
    }
}
