use thiserror::Error;

use nestlog_shared::room_code::RoomCodeError;
use nestlog_shared::NestlogError;
use nestlog_store::StoreError;
use nestlog_sync::RemoteError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Log(#[from] NestlogError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invalid room reference: {0}")]
    RoomCode(#[from] RoomCodeError),

    #[error("Not in a room")]
    NoRoom,

    #[error("No take-over decision is pending")]
    NoTakeoverPending,

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
