//! Schema migrations, keyed on `PRAGMA user_version`.
//!
//! `MIGRATIONS[n]` upgrades the schema from version `n` to `n + 1`. Opening
//! a database applies every step past the stored version, each one together
//! with its version bump in a single transaction.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = (&'static str, fn(&Connection) -> rusqlite::Result<()>);

const MIGRATIONS: &[Step] = &[("v001_initial", v001_initial::up)];

/// Schema version after all migrations.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let stored: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if stored > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{stored} is newer than this build (v{CURRENT_VERSION})"
        )));
    }

    for (index, (name, up)) in MIGRATIONS.iter().enumerate().skip(stored as usize) {
        let target = index as u32 + 1;
        tracing::info!(migration = *name, target, "applying migration");

        let tx = conn.unchecked_transaction()?;
        up(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
    }

    Ok(())
}
