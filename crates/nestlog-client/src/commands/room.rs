use tracing::{info, warn};

use nestlog_shared::room_code::RoomRef;
use nestlog_shared::RoomInfo;
use nestlog_sync::{FetchOutcome, SyncOutcome, SyncStatus};

use crate::error::{ClientError, Result};
use crate::events::{emit_event, TrackerEvent};
use crate::state::lock_state;
use crate::tracker::Tracker;

impl Tracker {
    pub fn room(&self) -> Option<RoomInfo> {
        lock_state(&self.state).room.clone()
    }

    /// Create a room seeded with the local log. This device becomes its
    /// writer and starts syncing.
    pub async fn create_room(&self) -> Result<RoomInfo> {
        self.leave_current();

        let (initial, device_id) = {
            let state = lock_state(&self.state);
            let device_id = state.device_id.clone();
            (state.log.snapshot(Some(device_id.clone())), device_id)
        };

        let room = self.remote.create(&initial).await?;
        info!(
            room = %room.document_id,
            code = %room.human_code,
            device = %device_id.short(),
            "Room created"
        );

        self.enter(&room)?;
        // Creating the room pushed our snapshot with us as writer.
        lock_state(&self.state).arbiter.record_push();
        self.start_sync(&room).await;
        Ok(room)
    }

    /// Join an existing room by document id or share code. The room must
    /// exist; its state is merged into ours by the initial pull.
    pub async fn join_room(&self, reference: &RoomRef) -> Result<(RoomInfo, SyncOutcome)> {
        if reference.is_lossy() {
            warn!(
                document_id = %reference.document_id(),
                "Joining by share code; the code only carries the tail of the room id"
            );
        }

        let document_id = reference.document_id().to_string();
        if let FetchOutcome::NotFound = self.remote.fetch(&document_id).await? {
            return Err(ClientError::RoomNotFound(document_id));
        }

        self.leave_current();
        let room = RoomInfo::new(document_id);
        self.enter(&room)?;
        info!(room = %room.document_id, code = %room.human_code, "Joined room");

        let outcome = self.start_sync(&room).await;
        Ok((room, outcome))
    }

    /// Stop syncing and forget the room. Local data stays.
    pub fn leave_room(&self) -> Result<RoomInfo> {
        let room = self.room().ok_or(ClientError::NoRoom)?;
        self.stop_sync();
        {
            let mut state = lock_state(&self.state);
            state.database.clear_room()?;
            state.room = None;
            state.reset_arbiter();
            state.sync_status = SyncStatus::Idle;
        }
        info!(room = %room.document_id, "Left room");
        emit_event(&self.events, TrackerEvent::RoomChanged { room: None });
        Ok(room)
    }

    fn leave_current(&self) {
        if self.room().is_some() {
            if let Err(e) = self.leave_room() {
                warn!(error = %e, "Failed to leave previous room");
            }
        }
    }

    fn enter(&self, room: &RoomInfo) -> Result<()> {
        {
            let mut state = lock_state(&self.state);
            state.database.save_room(room)?;
            state.room = Some(room.clone());
            state.reset_arbiter();
            state.sync_status = SyncStatus::Idle;
        }
        emit_event(
            &self.events,
            TrackerEvent::RoomChanged {
                room: Some(room.clone()),
            },
        );
        Ok(())
    }
}
