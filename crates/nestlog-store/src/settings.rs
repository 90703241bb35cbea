//! Notification settings and the stored document store credential.

use nestlog_shared::constants::{KEY_API_KEY, KEY_NOTIFICATION_SETTINGS};

use crate::database::Database;
use crate::error::Result;
use crate::models::NotificationSettings;

impl Database {
    /// Load notification settings, falling back to defaults when none were
    /// saved or the saved blob is unreadable.
    pub fn load_notification_settings(&self) -> Result<NotificationSettings> {
        match self.get_json(KEY_NOTIFICATION_SETTINGS) {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(crate::StoreError::Json { source, .. }) => {
                tracing::warn!(error = %source, "corrupt notification settings, using defaults");
                Ok(NotificationSettings::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.put_json(KEY_NOTIFICATION_SETTINGS, settings)?;
        tracing::info!(
            enabled = settings.enabled,
            awake_minutes = settings.awake_alert_minutes,
            sleep_minutes = settings.sleep_alert_minutes,
            "notification settings updated"
        );
        Ok(())
    }

    pub fn load_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .get_value(KEY_API_KEY)?
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    pub fn save_api_key(&self, key: &str) -> Result<()> {
        self.put_value(KEY_API_KEY, key.trim())
    }
}
