use thiserror::Error;

/// Failures talking to the remote document store.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Credential rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("Quota exceeded (HTTP {status})")]
    Quota { status: u16 },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Failures of one sync cycle. None of these stop the scheduler.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Local persistence error: {0}")]
    Persistence(String),
}
