pub mod alerts;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod log;
pub mod replica;
pub mod state;
pub mod tracker;

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use nestlog_store::Database;
use nestlog_sync::JsonBinClient;

pub use commands::activity::{CommandOutcome, TakeoverResolution};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::TrackerEvent;
pub use log::{ActivityCommand, ActivityLog, DayGroup};
pub use tracker::{Tracker, TrackerStatus};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("nestlog_client=debug,nestlog_sync=debug,nestlog_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the database and build a tracker talking to JSONBin.
pub fn open_tracker(config: &ClientConfig) -> Result<Tracker> {
    let database = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let stored_key = database.load_api_key()?;

    let remote = JsonBinClient::new(config.jsonbin(stored_key))?;
    if !remote.has_api_key() {
        tracing::warn!("No API key configured; room operations will likely be rejected");
    }

    Tracker::new(database, Arc::new(remote), config.scheduler())
}
