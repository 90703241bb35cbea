use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use nestlog_shared::{ActivityType, DeviceId};
use nestlog_sync::{Gate, SyncOutcome};

use crate::error::{ClientError, Result};
use crate::events::{emit_event, TrackerEvent};
use crate::log::ActivityCommand;
use crate::state::lock_state;
use crate::tracker::Tracker;

/// What happened to a requested mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Applied and persisted. `sync` is the push result, `None` outside a room.
    Applied { sync: Option<SyncOutcome> },
    /// Another device holds the room; the command waits for a take-over
    /// decision.
    AwaitingTakeover { current_writer: DeviceId },
}

/// Result of answering a take-over prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoverResolution {
    Accepted {
        claim: Option<SyncOutcome>,
        applied: Option<ActivityCommand>,
    },
    Declined {
        discarded: Option<ActivityCommand>,
    },
}

impl Tracker {
    pub async fn toggle_sleep_awake(&self) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::ToggleSleepAwake).await
    }

    pub async fn toggle_eating(&self) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::ToggleEating).await
    }

    pub async fn update_entry(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::UpdateEntry {
            id: id.to_string(),
            start,
            end,
        })
        .await
    }

    pub async fn update_entry_type(&self, id: &str, kind: ActivityType) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::UpdateEntryType {
            id: id.to_string(),
            kind,
        })
        .await
    }

    pub async fn split_entry(&self, id: &str, at: DateTime<Utc>) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::SplitEntry {
            id: id.to_string(),
            at,
        })
        .await
    }

    pub async fn delete_entry(&self, id: &str) -> Result<CommandOutcome> {
        self.perform(ActivityCommand::DeleteEntry { id: id.to_string() })
            .await
    }

    /// Run a mutation through the writer gate. If this device may write, the
    /// command is applied, persisted and pushed. Otherwise it is buffered
    /// and a take-over prompt is raised.
    pub async fn perform(&self, command: ActivityCommand) -> Result<CommandOutcome> {
        let now = Utc::now();

        let gate = lock_state(&self.state).arbiter.gate(command);
        match gate {
            Gate::Proceed(command) => {
                self.apply_locally(&command, now)?;
                let sync = self.push_now().await;
                Ok(CommandOutcome::Applied { sync })
            }
            Gate::Buffered {
                request,
                superseded,
            } => {
                if let Some(old) = superseded {
                    debug!(command = old.describe(), "Buffered command superseded");
                }
                info!(
                    writer = %request.current_writer.short(),
                    "Another device is writing, command buffered"
                );
                emit_event(
                    &self.events,
                    TrackerEvent::TakeoverRequested {
                        current_writer: request.current_writer.clone(),
                    },
                );
                Ok(CommandOutcome::AwaitingTakeover {
                    current_writer: request.current_writer,
                })
            }
        }
    }

    /// Answer the take-over prompt. Accepting claims the room by pushing the
    /// local snapshot, then runs the buffered command. Declining makes this
    /// device read-only and drops the buffered command. Fails with
    /// [`ClientError::NoTakeoverPending`] when nothing was asked.
    pub async fn resolve_takeover(&self, accept: bool) -> Result<TakeoverResolution> {
        let pending = {
            let mut state = lock_state(&self.state);
            if !state.arbiter.decision_pending() {
                return Err(ClientError::NoTakeoverPending);
            }
            if !accept {
                let discarded = state.arbiter.decline_takeover();
                if let Some(command) = &discarded {
                    info!(command = command.describe(), "Buffered command discarded");
                }
                return Ok(TakeoverResolution::Declined { discarded });
            }
            state.arbiter.accept_takeover()
        };

        let claim = self.push_now().await;
        if let Some(outcome) = &claim {
            if *outcome != SyncOutcome::Pushed {
                warn!(?outcome, "Take-over push did not land, next sync retries");
            }
        }

        let applied = match pending {
            Some(command) => {
                self.apply_locally(&command, Utc::now())?;
                self.push_now().await;
                Some(command)
            }
            None => None,
        };

        Ok(TakeoverResolution::Accepted { claim, applied })
    }

    fn apply_locally(&self, command: &ActivityCommand, now: DateTime<Utc>) -> Result<()> {
        let event = {
            let mut state = lock_state(&self.state);
            command.apply(&mut state.log, now)?;
            state.persist_log()?;
            let current = state.log.current();
            TrackerEvent::StateChanged {
                activity: current.activity_type(),
                since: current.start_time,
                entries: state.log.entries().len(),
            }
        };

        debug!(command = command.describe(), "Command applied");
        emit_event(&self.events, event);
        Ok(())
    }
}
