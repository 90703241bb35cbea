use nestlog_shared::constants::KEY_DEVICE_ID;
use nestlog_shared::DeviceId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Return this install's device id, generating and persisting it on
    /// first use. The id is never rotated afterwards.
    pub fn device_id(&self) -> Result<DeviceId> {
        if let Some(existing) = self.get_value(KEY_DEVICE_ID)? {
            return Ok(DeviceId::from_string(existing));
        }

        let id = DeviceId::generate();
        self.put_value(KEY_DEVICE_ID, id.as_str())?;
        tracing::info!(device = %id.short(), "generated device id");
        Ok(id)
    }
}
