//! Elapsed-time alerts.
//!
//! A periodic check compares how long the open span has run with the
//! threshold for its type and raises one alert per span once it is
//! exceeded. Feeds never alert.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nestlog_shared::constants::{ALERT_TAG_AWAKE, ALERT_TAG_SLEEP};
use nestlog_shared::{ActivityType, CurrentState};
use nestlog_store::NotificationSettings;

use crate::events::{emit_event, EventSender, TrackerEvent};
use crate::log::format_elapsed;
use crate::state::{lock_state, SharedState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    /// Replaces an earlier alert with the same tag on surfaces that dedupe.
    pub tag: String,
}

/// Where alerts go. Fire-and-forget.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &Alert);
}

/// Writes alerts to the log.
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, alert: &Alert) {
        info!(tag = %alert.tag, title = %alert.title, "{}", alert.body);
    }
}

#[derive(Debug, Default)]
pub struct AlertEngine {
    /// Span already alerted on, identified by its start and type.
    alerted: Option<(DateTime<Utc>, ActivityType)>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        &mut self,
        settings: &NotificationSettings,
        current: &CurrentState,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if !settings.enabled {
            return None;
        }

        let kind = current.activity_type();
        let span = (current.start_time, kind);
        if self.alerted == Some(span) {
            return None;
        }

        let (threshold_minutes, tag, title) = match kind {
            ActivityType::Awake => (settings.awake_alert_minutes, ALERT_TAG_AWAKE, "Awake window"),
            ActivityType::Sleeping => (settings.sleep_alert_minutes, ALERT_TAG_SLEEP, "Long sleep"),
            ActivityType::Eating => return None,
        };

        let elapsed = (now - current.start_time).num_seconds();
        if elapsed < i64::from(threshold_minutes) * 60 {
            return None;
        }

        self.alerted = Some(span);
        Some(Alert {
            title: title.to_string(),
            body: format!("Baby has been {kind} for {}", format_elapsed(elapsed)),
            tag: tag.to_string(),
        })
    }
}

/// Spawn the periodic alert check. Runs until `cancel` fires.
pub fn spawn_alert_loop(
    state: SharedState,
    sink: Arc<dyn AlertSink>,
    events: EventSender,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut engine = AlertEngine::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Alert loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let alert = {
                        let state = lock_state(&state);
                        engine.check(&state.notification_settings, state.log.current(), Utc::now())
                    };
                    if let Some(alert) = alert {
                        sink.notify(&alert);
                        emit_event(&events, TrackerEvent::Alert {
                            title: alert.title,
                            body: alert.body,
                            tag: alert.tag,
                        });
                    }
                }
            }
        }
    })
}
