//! Last seen dispatch sequence number.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared record of the highest dispatch sequence seen on a session.
///
/// Written by the receive loop, read by the heartbeat task. `0` is reserved
/// for "nothing seen yet"; gateway sequences start at 1.
#[derive(Debug, Default)]
pub struct SequenceTracker(AtomicU64);

impl SequenceTracker {
    /// Create an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Record a sequence number. Older numbers never move the tracker back.
    pub fn observe(&self, sequence: u64) {
        self.0.fetch_max(sequence, Ordering::SeqCst);
    }

    /// The last sequence number seen, if any.
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            n => Some(n),
        }
    }
}
