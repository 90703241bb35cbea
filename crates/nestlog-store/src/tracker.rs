//! Persistence of the activity log blob.

use nestlog_shared::constants::KEY_TRACKER_DATA;

use crate::database::Database;
use crate::error::Result;
use crate::models::TrackerData;

impl Database {
    /// Load the saved activity log, `None` on first run or when the saved
    /// blob is unreadable.
    pub fn load_tracker_data(&self) -> Result<Option<TrackerData>> {
        match self.get_json(KEY_TRACKER_DATA) {
            Ok(data) => Ok(data),
            Err(crate::StoreError::Json { source, .. }) => {
                tracing::warn!(error = %source, "corrupt tracker data, starting a new log");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite the saved activity log.
    pub fn save_tracker_data(&self, data: &TrackerData) -> Result<()> {
        self.put_json(KEY_TRACKER_DATA, data)?;
        tracing::debug!(entries = data.entries.len(), "tracker data saved");
        Ok(())
    }
}
