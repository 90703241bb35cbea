use tracing::info;

use nestlog_store::NotificationSettings;

use crate::error::{ClientError, Result};
use crate::state::lock_state;
use crate::tracker::Tracker;

impl Tracker {
    pub fn notification_settings(&self) -> NotificationSettings {
        lock_state(&self.state).notification_settings.clone()
    }

    pub fn update_notification_settings(&self, settings: NotificationSettings) -> Result<()> {
        if settings.awake_alert_minutes == 0 || settings.sleep_alert_minutes == 0 {
            return Err(ClientError::Config(
                "Alert thresholds must be at least one minute".to_string(),
            ));
        }

        let mut state = lock_state(&self.state);
        state.database.save_notification_settings(&settings)?;
        state.notification_settings = settings;
        Ok(())
    }

    /// Save the access key. The HTTP client picks it up on the next start.
    pub fn save_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ClientError::Config("API key is empty".to_string()));
        }
        lock_state(&self.state).database.save_api_key(key)?;
        info!("API key saved");
        Ok(())
    }
}
