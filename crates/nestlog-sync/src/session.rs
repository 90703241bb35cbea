//! Per-room single-flight token.
//!
//! Only one sync operation (pull or push) may be in flight for a room at a
//! time. A request that finds the session busy is dropped, not queued: the
//! next tick or mutation will try again with fresher state anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

/// Sync session for one joined room.
#[derive(Debug)]
pub struct SyncSession {
    document_id: String,
    in_flight: AtomicBool,
}

impl SyncSession {
    pub fn new(document_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            document_id: document_id.into(),
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Claim the session without waiting. `None` if an operation is already
    /// in flight. The claim is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SyncGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        trace!(room = %self.document_id, "sync session acquired");
        Some(SyncGuard {
            session: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the session's single in-flight slot.
#[derive(Debug)]
pub struct SyncGuard {
    session: Arc<SyncSession>,
}

impl SyncGuard {
    pub fn document_id(&self) -> &str {
        &self.session.document_id
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
        trace!(room = %self.session.document_id, "sync session released");
    }
}
