// Room synchronization: remote document client, two-way snapshot merge,
// single-writer arbitration and the periodic pull/push scheduler.

pub mod client;
pub mod error;
pub mod merge;
pub mod replica;
pub mod scheduler;
pub mod session;
pub mod writer;

pub use client::{FetchOutcome, JsonBinClient, JsonBinConfig, RemoteDocumentClient};
pub use error::{RemoteError, SyncError};
pub use merge::{has_ongoing, merge, merge_at};
pub use replica::{MergeApplied, SyncReplica, SyncStatus};
pub use scheduler::{pull, push, SchedulerConfig, SyncOutcome, SyncScheduler};
pub use session::{SyncGuard, SyncSession};
pub use writer::{Gate, TakeoverRequest, WriterArbiter, WriterRole};
