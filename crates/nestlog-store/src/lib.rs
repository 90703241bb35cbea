//! # nestlog-store
//!
//! Local durable storage for nestlog, backed by SQLite.
//!
//! Everything the app keeps on disk is a JSON blob or plain string under a
//! fixed key in a single key-value table: the activity log with its open
//! span, the joined room, the device id, notification settings and the
//! document store credential. The crate exposes a synchronous `Database`
//! handle with typed helpers for each of those.

pub mod database;
pub mod device;
pub mod kv;
pub mod migrations;
pub mod models;
pub mod rooms;
pub mod settings;
pub mod tracker;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
