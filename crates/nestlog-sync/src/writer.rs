//! Optimistic single-writer arbitration.
//!
//! Only the device on record as writer pushes merged state back to a room.
//! The record is advisory: a device claims writership simply by pushing,
//! with no compare-and-swap on the remote document, so two devices claiming
//! at once can race. The loser notices on its next pull (a writer id it has
//! not seen before) and is asked whether to take over again.
//!
//! Mutations attempted while another device holds the room are buffered
//! (one slot, newest wins) until the user decides.

use tracing::{debug, info};

use nestlog_shared::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterRole {
    /// No claim by this device.
    Unclaimed,
    /// This device is the writer on record.
    Writer,
    /// The user declined to take over from another device.
    ReadOnly,
}

/// A take-over decision to put in front of the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoverRequest {
    pub current_writer: DeviceId,
}

/// Result of checking a mutation against the writer record.
#[derive(Debug, PartialEq, Eq)]
pub enum Gate<A> {
    /// Run the action now.
    Proceed(A),
    /// The action was buffered pending a take-over decision. `superseded`
    /// holds the action it replaced in the single buffer slot, if any.
    Buffered {
        request: TakeoverRequest,
        superseded: Option<A>,
    },
}

/// Writer state for one device in one room. `A` is the buffered action type.
#[derive(Debug)]
pub struct WriterArbiter<A> {
    device_id: DeviceId,
    last_seen_writer: Option<DeviceId>,
    read_only: bool,
    decision_pending: bool,
    pending: Option<A>,
}

impl<A> WriterArbiter<A> {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            last_seen_writer: None,
            read_only: false,
            decision_pending: false,
            pending: None,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn role(&self) -> WriterRole {
        if self.read_only {
            WriterRole::ReadOnly
        } else if self.is_writer() {
            WriterRole::Writer
        } else {
            WriterRole::Unclaimed
        }
    }

    /// The writer id this device saw last (possibly itself).
    pub fn writer_on_record(&self) -> Option<&DeviceId> {
        self.last_seen_writer.as_ref()
    }

    pub fn is_writer(&self) -> bool {
        self.last_seen_writer.as_ref() == Some(&self.device_id)
    }

    pub fn decision_pending(&self) -> bool {
        self.decision_pending
    }

    pub fn has_pending_action(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a pull may push its merged result back to the room.
    pub fn may_push_back(&self) -> bool {
        !self.read_only && !self.decision_pending
    }

    /// Inspect the writer id carried by a merged snapshot. Returns a
    /// take-over request when a device other than this one, and other than
    /// the last writer seen, has claimed the room. Never changes the role
    /// on its own beyond recording what was seen.
    pub fn observe_writer(&mut self, writer: Option<&DeviceId>) -> Option<TakeoverRequest> {
        let writer = writer?;

        if *writer == self.device_id {
            self.last_seen_writer = Some(writer.clone());
            return None;
        }

        if self.last_seen_writer.as_ref() == Some(writer) {
            return None;
        }

        info!(
            device = %self.device_id.short(),
            writer = %writer.short(),
            "another device is writing to this room"
        );
        self.last_seen_writer = Some(writer.clone());
        self.decision_pending = true;
        Some(TakeoverRequest {
            current_writer: writer.clone(),
        })
    }

    /// Check a state-mutating action. Proceeds if this device is the writer
    /// or no writer is on record; otherwise buffers it and asks for a
    /// take-over decision.
    pub fn gate(&mut self, action: A) -> Gate<A> {
        let current_writer = match &self.last_seen_writer {
            None => return Gate::Proceed(action),
            Some(writer) if *writer == self.device_id => return Gate::Proceed(action),
            Some(writer) => writer.clone(),
        };

        let superseded = self.pending.replace(action);
        if superseded.is_some() {
            debug!("buffered action replaced by a newer one");
        }
        self.decision_pending = true;

        Gate::Buffered {
            request: TakeoverRequest { current_writer },
            superseded,
        }
    }

    /// The user accepted the take-over. This device becomes writer; the
    /// caller must push the local snapshot, then run the returned action.
    pub fn accept_takeover(&mut self) -> Option<A> {
        info!(device = %self.device_id.short(), "take-over accepted");
        self.read_only = false;
        self.decision_pending = false;
        self.last_seen_writer = Some(self.device_id.clone());
        self.pending.take()
    }

    /// The user declined. This device turns read-only and the buffered
    /// action, returned here, is discarded.
    pub fn decline_takeover(&mut self) -> Option<A> {
        info!(device = %self.device_id.short(), "take-over declined, now read-only");
        self.read_only = true;
        self.decision_pending = false;
        self.pending.take()
    }

    /// A push by this device landed. Pushing is claiming.
    pub fn record_push(&mut self) {
        self.last_seen_writer = Some(self.device_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(id: &str) -> DeviceId {
        DeviceId::from_string(id)
    }

    #[test]
    fn test_unclaimed_proceeds() {
        let mut arbiter: WriterArbiter<u32> = WriterArbiter::new(dev("me"));
        assert_eq!(arbiter.role(), WriterRole::Unclaimed);
        assert_eq!(arbiter.gate(1), Gate::Proceed(1));
        assert!(arbiter.may_push_back());
    }

    #[test]
    fn test_own_writer_id_is_not_a_takeover() {
        let mut arbiter: WriterArbiter<u32> = WriterArbiter::new(dev("me"));
        assert!(arbiter.observe_writer(Some(&dev("me"))).is_none());
        assert_eq!(arbiter.role(), WriterRole::Writer);
        assert!(arbiter.observe_writer(None).is_none());
    }

    #[test]
    fn test_foreign_writer_prompts_once() {
        let mut arbiter: WriterArbiter<u32> = WriterArbiter::new(dev("me"));
        let request = arbiter.observe_writer(Some(&dev("x"))).expect("prompt");
        assert_eq!(request.current_writer, dev("x"));
        assert!(arbiter.decision_pending());
        assert!(!arbiter.may_push_back());

        // Same writer again: already seen.
        assert!(arbiter.observe_writer(Some(&dev("x"))).is_none());
        // A different one prompts again.
        assert!(arbiter.observe_writer(Some(&dev("y"))).is_some());
    }

    #[test]
    fn test_mutation_buffered_behind_other_writer() {
        let mut arbiter: WriterArbiter<&str> = WriterArbiter::new(dev("me"));
        arbiter.observe_writer(Some(&dev("x")));

        match arbiter.gate("toggle") {
            Gate::Buffered { request, superseded } => {
                assert_eq!(request.current_writer, dev("x"));
                assert!(superseded.is_none());
            }
            other => panic!("expected buffered, got {other:?}"),
        }
        assert!(arbiter.has_pending_action());

        match arbiter.gate("eat") {
            Gate::Buffered { superseded, .. } => assert_eq!(superseded, Some("toggle")),
            other => panic!("expected buffered, got {other:?}"),
        }
    }

    #[test]
    fn test_accept_claims_and_releases_pending() {
        let mut arbiter: WriterArbiter<&str> = WriterArbiter::new(dev("me"));
        arbiter.observe_writer(Some(&dev("x")));
        arbiter.gate("toggle");

        assert_eq!(arbiter.accept_takeover(), Some("toggle"));
        assert_eq!(arbiter.role(), WriterRole::Writer);
        assert!(arbiter.may_push_back());
        assert_eq!(arbiter.gate("next"), Gate::Proceed("next"));
    }

    #[test]
    fn test_decline_discards_and_goes_read_only() {
        let mut arbiter: WriterArbiter<&str> = WriterArbiter::new(dev("me"));
        arbiter.observe_writer(Some(&dev("x")));
        arbiter.gate("toggle");

        assert_eq!(arbiter.decline_takeover(), Some("toggle"));
        assert_eq!(arbiter.role(), WriterRole::ReadOnly);
        assert!(!arbiter.has_pending_action());
        assert!(!arbiter.may_push_back());

        // Still gated: a later attempt re-raises the decision.
        assert!(matches!(arbiter.gate("again"), Gate::Buffered { .. }));
        assert!(arbiter.decision_pending());
    }

    #[test]
    fn test_reclaim_by_previous_writer_prompts_after_our_push() {
        let mut arbiter: WriterArbiter<u32> = WriterArbiter::new(dev("me"));
        arbiter.observe_writer(Some(&dev("x")));
        arbiter.accept_takeover();
        arbiter.record_push();

        // x takes the room back later.
        assert!(arbiter.observe_writer(Some(&dev("x"))).is_some());
        assert_eq!(arbiter.role(), WriterRole::Unclaimed);
    }
}
