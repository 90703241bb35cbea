//! Two-way merge of a local and a remote snapshot.
//!
//! This is a heuristic, not a CRDT: it merges exactly two snapshots and
//! trusts each device's clock. Entries are unioned by id with the remote
//! copy winning a collision. The open span is arbitrated with the table
//! below, evaluated in order:
//!
//! | local ongoing | remote ongoing | result                         |
//! |---------------|----------------|--------------------------------|
//! | yes           | no             | local                          |
//! | no            | yes            | remote                         |
//! | yes           | yes            | later `start_time` (tie: local) |
//! | no            | no             | later `last_updated` (tie: local) |

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use nestlog_shared::constants::ONGOING_MIN_AGE_MS;
use nestlog_shared::{ActivityEntry, CurrentState, SyncSnapshot};

/// Merge using the wall clock for the output timestamp.
pub fn merge(local: &SyncSnapshot, remote: &SyncSnapshot) -> SyncSnapshot {
    merge_at(local, remote, Utc::now())
}

/// Merge two snapshots. Deterministic for fixed inputs and `now`.
pub fn merge_at(local: &SyncSnapshot, remote: &SyncSnapshot, now: DateTime<Utc>) -> SyncSnapshot {
    let mut by_id: HashMap<&str, &ActivityEntry> =
        HashMap::with_capacity(local.entries.len() + remote.entries.len());
    for entry in &local.entries {
        by_id.insert(entry.id.as_str(), entry);
    }
    // Remote replaces local wholesale on an id collision.
    for entry in &remote.entries {
        by_id.insert(entry.id.as_str(), entry);
    }

    let mut entries: Vec<ActivityEntry> = by_id.into_values().cloned().collect();
    entries.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    let current = arbitrate_current(local, remote, now);

    let writer_device_id = remote
        .writer_device_id
        .clone()
        .or_else(|| local.writer_device_id.clone());

    debug!(
        local_entries = local.entries.len(),
        remote_entries = remote.entries.len(),
        merged_entries = entries.len(),
        current = %current.activity_type(),
        "merged snapshots"
    );

    SyncSnapshot {
        entries,
        current,
        last_updated: now,
        writer_device_id,
    }
}

/// Whether `snapshot` carries an open span worth keeping: it started at
/// least five seconds ago and no closed entry ends after it started. An
/// entry ending after the span's start means another device already closed
/// that span, so the pointer is stale.
pub fn has_ongoing(snapshot: &SyncSnapshot, now: DateTime<Utc>) -> bool {
    let start = snapshot.current.start_time;
    if now - start < Duration::milliseconds(ONGOING_MIN_AGE_MS) {
        return false;
    }

    !snapshot
        .entries
        .iter()
        .any(|entry| entry.end_time.is_some_and(|end| end > start))
}

fn arbitrate_current(
    local: &SyncSnapshot,
    remote: &SyncSnapshot,
    now: DateTime<Utc>,
) -> CurrentState {
    let local_ongoing = has_ongoing(local, now);
    let remote_ongoing = has_ongoing(remote, now);

    let take_remote = match (local_ongoing, remote_ongoing) {
        (true, false) => false,
        (false, true) => true,
        (true, true) => remote.current.start_time > local.current.start_time,
        (false, false) => remote.last_updated > local.last_updated,
    };

    debug!(
        local_ongoing,
        remote_ongoing,
        source = if take_remote { "remote" } else { "local" },
        "arbitrated current state"
    );

    if take_remote {
        remote.current.clone()
    } else {
        local.current.clone()
    }
}
