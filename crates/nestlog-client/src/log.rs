//! The activity log: closed entries plus the open span.
//!
//! All operations take `now` explicitly. Nothing here touches storage or the
//! network; callers persist [`ActivityLog::to_data`] after a mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use nestlog_shared::{ActivityEntry, ActivityType, CurrentState, DeviceId, NestlogError, SyncSnapshot};
use nestlog_store::TrackerData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
    entries: Vec<ActivityEntry>,
    current: CurrentState,
    last_updated: DateTime<Utc>,
}

/// Entries that started on one UTC calendar day.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    /// An empty log, awake since `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            current: CurrentState::awake_since(now),
            last_updated: now,
        }
    }

    /// Restore a persisted log. An absent or empty log starts over, awake
    /// since `now`; the flag says whether that happened.
    pub fn restore(data: Option<TrackerData>, now: DateTime<Utc>) -> (Self, bool) {
        match data {
            Some(data) if !data.entries.is_empty() => {
                let last_updated = data.last_updated.unwrap_or(data.current.start_time);
                let mut log = Self {
                    entries: data.entries,
                    current: data.current,
                    last_updated,
                };
                log.sort_entries();
                (log, false)
            }
            _ => (Self::new(now), true),
        }
    }

    pub fn to_data(&self) -> TrackerData {
        TrackerData {
            entries: self.entries.clone(),
            current: self.current.clone(),
            last_updated: Some(self.last_updated),
        }
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn current(&self) -> &CurrentState {
        &self.current
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn snapshot(&self, writer: Option<DeviceId>) -> SyncSnapshot {
        SyncSnapshot {
            entries: self.entries.clone(),
            current: self.current.clone(),
            last_updated: self.last_updated,
            writer_device_id: writer,
        }
    }

    /// Adopt a merged snapshot wholesale.
    pub fn apply_snapshot(&mut self, snapshot: SyncSnapshot) {
        self.entries = snapshot.entries;
        self.current = snapshot.current;
        self.last_updated = snapshot.last_updated;
        self.sort_entries();
    }

    /// Seconds since the open span started. Never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.current.start_time).num_seconds().max(0)
    }

    // -----------------------------------------------------------------------
    // Toggles
    // -----------------------------------------------------------------------

    /// Close the open span and flip between sleeping and awake. Eating ends.
    pub fn toggle_sleep_awake(&mut self, now: DateTime<Utc>) {
        self.close_span(self.current.activity_type(), now);
        self.current = CurrentState {
            activity: match self.current.activity {
                ActivityType::Sleeping => ActivityType::Awake,
                _ => ActivityType::Sleeping,
            },
            eating: false,
            start_time: now,
        };
        self.last_updated = now;
    }

    /// Start or finish a feed. A sleeping baby is woken first.
    pub fn toggle_eating(&mut self, now: DateTime<Utc>) {
        if self.current.activity == ActivityType::Sleeping {
            self.toggle_sleep_awake(now);
        }

        if self.current.eating {
            self.close_span(ActivityType::Eating, now);
            self.current.eating = false;
        } else {
            if self.current.activity == ActivityType::Awake {
                self.close_span(ActivityType::Awake, now);
            }
            self.current.eating = true;
        }
        self.current.start_time = now;
        self.last_updated = now;
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub fn update_entry(
        &mut self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), NestlogError> {
        if end < start {
            return Err(NestlogError::InvalidSpan { start, end });
        }
        let entry = self.entry_mut(id)?;
        entry.start_time = start;
        entry.end_time = Some(end);
        self.sort_entries();
        self.last_updated = now;
        Ok(())
    }

    pub fn update_entry_type(
        &mut self,
        id: &str,
        kind: ActivityType,
        now: DateTime<Utc>,
    ) -> Result<(), NestlogError> {
        self.entry_mut(id)?.kind = kind;
        self.last_updated = now;
        Ok(())
    }

    /// Split a closed entry at `at`, which must fall strictly inside it. The
    /// second half gets a fresh id, returned here.
    pub fn split_entry(
        &mut self,
        id: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String, NestlogError> {
        let entry = self.entry_mut(id)?;
        let Some(end) = entry.end_time else {
            return Err(NestlogError::OpenEntry(id.to_string()));
        };
        if at <= entry.start_time || at >= end {
            return Err(NestlogError::SplitOutsideSpan {
                id: id.to_string(),
                at,
            });
        }

        entry.end_time = Some(at);
        let second = ActivityEntry::closed(entry.kind, at, end);
        let second_id = second.id.clone();
        self.entries.push(second);
        self.sort_entries();
        self.last_updated = now;
        Ok(second_id)
    }

    pub fn delete_entry(&mut self, id: &str, now: DateTime<Utc>) -> Result<ActivityEntry, NestlogError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| NestlogError::EntryNotFound(id.to_string()))?;
        let removed = self.entries.remove(index);
        self.last_updated = now;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Entries grouped by the UTC date they started on. Newest day first,
    /// entries within a day oldest first.
    pub fn grouped_by_day(&self) -> Vec<DayGroup> {
        let mut groups: Vec<DayGroup> = Vec::new();
        for entry in &self.entries {
            let date = entry.start_time.date_naive();
            match groups.iter_mut().find(|g| g.date == date) {
                Some(group) => group.entries.push(entry.clone()),
                None => groups.push(DayGroup {
                    date,
                    entries: vec![entry.clone()],
                }),
            }
        }

        for group in &mut groups {
            group.entries.sort_by_key(|e| e.start_time);
        }
        groups.sort_by(|a, b| b.date.cmp(&a.date));
        groups
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut ActivityEntry, NestlogError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| NestlogError::EntryNotFound(id.to_string()))
    }

    /// Record the open span as a closed entry. Empty spans are dropped.
    fn close_span(&mut self, kind: ActivityType, now: DateTime<Utc>) {
        let start = self.current.start_time;
        if now <= start {
            return;
        }
        self.entries.push(ActivityEntry::closed(kind, start, now));
    }

    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// A state-changing operation on the log. These are what the writer
/// arbiter buffers while a take-over decision is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityCommand {
    ToggleSleepAwake,
    ToggleEating,
    UpdateEntry {
        id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    UpdateEntryType {
        id: String,
        kind: ActivityType,
    },
    SplitEntry {
        id: String,
        at: DateTime<Utc>,
    },
    DeleteEntry {
        id: String,
    },
}

impl ActivityCommand {
    pub fn apply(&self, log: &mut ActivityLog, now: DateTime<Utc>) -> Result<(), NestlogError> {
        match self {
            Self::ToggleSleepAwake => log.toggle_sleep_awake(now),
            Self::ToggleEating => log.toggle_eating(now),
            Self::UpdateEntry { id, start, end } => log.update_entry(id, *start, *end, now)?,
            Self::UpdateEntryType { id, kind } => log.update_entry_type(id, *kind, now)?,
            Self::SplitEntry { id, at } => {
                log.split_entry(id, *at, now)?;
            }
            Self::DeleteEntry { id } => {
                log.delete_entry(id, now)?;
            }
        }
        Ok(())
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::ToggleSleepAwake => "toggle sleep/awake",
            Self::ToggleEating => "toggle eating",
            Self::UpdateEntry { .. } => "edit entry times",
            Self::UpdateEntryType { .. } => "change entry type",
            Self::SplitEntry { .. } => "split entry",
            Self::DeleteEntry { .. } => "delete entry",
        }
    }
}

/// `1h 05m`, `12m 30s`, `45s`.
pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
