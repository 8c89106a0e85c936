//! Timeout based failure detection.
//!
//! Every process decides on its own when a peer has been silent for too long.
//! Nothing is agreed upon with the rest of the group, so two processes may
//! transiently (or, if the suspect was only slow, permanently) disagree on
//! who is still a member.

use super::message::ProcessId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FailureDetector {
    timeout: Duration,
    last_seen: HashMap<ProcessId, Instant>,
}

impl FailureDetector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seen: HashMap::new(),
        }
    }

    pub fn observe(&mut self, id: ProcessId, now: Instant) {
        self.last_seen.insert(id, now);
    }

    pub fn last_seen(&self, id: ProcessId) -> Option<Instant> {
        self.last_seen.get(&id).copied()
    }

    /// Returns the peers of `peers` that have been silent longer than the timeout.
    /// A peer never heard of before gets `now` as its first sighting instead.
    pub fn check(&mut self, peers: &[ProcessId], now: Instant) -> Vec<ProcessId> {
        let mut crashed = Vec::new();
        for &p in peers {
            match self.last_seen.get(&p) {
                None => {
                    self.last_seen.insert(p, now);
                }
                Some(&seen) if now.saturating_duration_since(seen) > self.timeout => {
                    crashed.push(p);
                }
                Some(_) => {}
            }
        }
        crashed
    }
}
