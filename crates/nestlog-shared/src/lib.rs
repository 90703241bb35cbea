// Domain types shared by the store, sync and client crates.

pub mod constants;
pub mod error;
pub mod identity;
pub mod room_code;
pub mod types;

pub use error::NestlogError;
pub use identity::DeviceId;
pub use types::{ActivityEntry, ActivityType, CurrentState, RoomInfo, SyncSnapshot};
