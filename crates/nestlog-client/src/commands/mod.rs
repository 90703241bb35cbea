//! Tracker operations, grouped by domain.
//!
//! Each sub-module adds an `impl Tracker` block. Mutations persist before
//! returning and push to the joined room, if any.

pub mod activity;
pub mod room;
pub mod settings;
