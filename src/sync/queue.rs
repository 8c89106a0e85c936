use super::message::{Message, MessageKind, ProcessId};
use std::collections::BTreeSet;
use std::fmt;

/// Pending protocol messages of one process, sorted by the message total order
/// after every [`RequestQueue::cleanup`]. A cleaned queue never starts with an ALLOW.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue(Vec<Message>);

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg);
    }

    /// Sorts the queue and drops the stale ALLOWs that ended up at its head.
    pub fn cleanup(&mut self) {
        self.0.sort();
        let stale = self
            .0
            .iter()
            .take_while(|m| m.kind == MessageKind::Allow)
            .count();
        self.0.drain(..stale);
    }

    pub fn head(&self) -> Option<&Message> {
        self.0.first()
    }

    pub fn is_head_from(&self, id: ProcessId) -> bool {
        self.head().is_some_and(|m| m.sender == id)
    }

    pub fn pop_head(&mut self) -> Option<Message> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// Distinct senders of everything behind the head.
    pub fn senders_after_head(&self) -> BTreeSet<ProcessId> {
        self.0.iter().skip(1).map(|m| m.sender).collect()
    }

    // Drops the head together with every ALLOW, leaving the later ENTER requests
    pub fn retain_later_enters(&mut self) {
        self.0 = self
            .0
            .drain(..)
            .skip(1)
            .filter(|m| m.kind == MessageKind::Enter)
            .collect();
    }

    /// Removes every message sent by `id`, returning how many were dropped.
    pub fn purge_sender(&mut self, id: ProcessId) -> usize {
        let before = self.0.len();
        self.0.retain(|m| m.sender != id);
        before - self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        self.0.iter()
    }
}

impl fmt::Display for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, m) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str("]")
    }
}
