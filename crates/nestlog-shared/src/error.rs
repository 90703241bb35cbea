use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NestlogError {
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid span: end {end} is before start {start}")]
    InvalidSpan {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Cannot split entry {id}: {at} is not inside the span")]
    SplitOutsideSpan { id: String, at: DateTime<Utc> },

    #[error("Entry {0} is still open")]
    OpenEntry(String),
}
