//! Trailing-edge debounce queue for coalescing refresh signals.
//!
//! N "this university needs fresh data" signals arriving within the window
//! become one network round trip. The deadline re-arms on every enqueue
//! (fires `delay` after the *last* signal, not the first), which maximizes
//! coalescing under bursty push traffic.

use std::collections::HashSet;
use tokio::time::{Duration, Instant};
use uniboard_core::UniversityId;

/// Deduplicated pending set with a trailing-edge deadline.
#[derive(Debug)]
pub struct BatchQueue {
    pending: HashSet<UniversityId>,
    deadline: Option<Instant>,
    delay: Duration,
}

impl BatchQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            deadline: None,
            delay,
        }
    }

    /// Add an id and re-arm the timer.
    pub fn enqueue(&mut self, id: UniversityId, now: Instant) {
        self.pending.insert(id);
        self.deadline = Some(now + self.delay);
    }

    /// Deadline of the armed timer, if any ids are pending.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            None
        } else {
            self.deadline
        }
    }

    /// If the deadline has passed, atomically snapshot and clear the
    /// pending set. Ids are sorted so a batch for a given set of signals is
    /// deterministic.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<UniversityId>> {
        match self.deadline {
            Some(deadline) if deadline <= now && !self.pending.is_empty() => {
                let mut ids: Vec<UniversityId> = self.pending.drain().collect();
                ids.sort();
                self.deadline = None;
                Some(ids)
            }
            _ => None,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
