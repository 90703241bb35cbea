use async_trait::async_trait;
use tracing::{debug, error};

use nestlog_shared::{DeviceId, SyncSnapshot};
use nestlog_sync::{MergeApplied, SyncError, SyncReplica, SyncStatus};

use crate::events::{emit_event, EventSender, TrackerEvent};
use crate::state::{lock_state, SharedState};

/// [`SyncReplica`] over the shared application state.
pub struct LocalReplica {
    state: SharedState,
    events: EventSender,
    device_id: DeviceId,
}

impl LocalReplica {
    pub fn new(state: SharedState, events: EventSender) -> Self {
        let device_id = lock_state(&state).device_id.clone();
        Self {
            state,
            events,
            device_id,
        }
    }
}

#[async_trait]
impl SyncReplica for LocalReplica {
    fn device_id(&self) -> DeviceId {
        self.device_id.clone()
    }

    async fn local_snapshot(&self) -> SyncSnapshot {
        let state = lock_state(&self.state);
        state.log.snapshot(state.arbiter.writer_on_record().cloned())
    }

    async fn apply_merged(&self, merged: SyncSnapshot) -> Result<MergeApplied, SyncError> {
        let (takeover, changed, push_back, persisted) = {
            let mut state = lock_state(&self.state);
            let takeover = state.arbiter.observe_writer(merged.writer_device_id.as_ref());

            let before = (state.log.entries().len(), state.log.current().clone());
            state.log.apply_snapshot(merged);
            let after = (state.log.entries().len(), state.log.current().clone());

            let push_back = state.arbiter.may_push_back();
            let persisted = state.persist_log();
            let changed = (before != after).then(|| {
                TrackerEvent::StateChanged {
                    activity: after.1.activity_type(),
                    since: after.1.start_time,
                    entries: after.0,
                }
            });
            (takeover, changed, push_back, persisted)
        };

        if let Some(event) = changed {
            emit_event(&self.events, event);
        }
        if let Some(request) = takeover {
            emit_event(
                &self.events,
                TrackerEvent::TakeoverRequested {
                    current_writer: request.current_writer,
                },
            );
        }

        if let Err(e) = persisted {
            error!(error = %e, "Failed to persist merged state");
            return Err(SyncError::Persistence(e.to_string()));
        }

        debug!(push_back, "Merged state applied");
        Ok(MergeApplied { push_back })
    }

    async fn mark_pushed(&self) {
        lock_state(&self.state).arbiter.record_push();
    }

    async fn report_status(&self, status: SyncStatus) {
        let changed = {
            let mut state = lock_state(&self.state);
            // Successive successful syncs are not news.
            let changed = std::mem::discriminant(&state.sync_status)
                != std::mem::discriminant(&status)
                || (status.is_error() && state.sync_status != status);
            state.sync_status = status.clone();
            changed
        };

        if changed {
            emit_event(
                &self.events,
                TrackerEvent::SyncStatusChanged {
                    message: status.message(),
                    is_error: status.is_error(),
                },
            );
        }
    }
}
