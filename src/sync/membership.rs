use super::message::ProcessId;
use std::collections::BTreeSet;

/// One process' view of the group. Both lists stay sorted by id and only ever shrink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    all: Vec<ProcessId>,
    others: Vec<ProcessId>,
}

impl Membership {
    pub fn new(me: ProcessId, members: impl IntoIterator<Item = ProcessId>) -> Self {
        let mut all: Vec<_> = members.into_iter().collect();
        all.sort_unstable();
        all.dedup();
        let others = all.iter().copied().filter(|&p| p != me).collect();
        Self { all, others }
    }

    pub fn all(&self) -> &[ProcessId] {
        &self.all
    }

    pub fn others(&self) -> &[ProcessId] {
        &self.others
    }

    pub fn others_set(&self) -> BTreeSet<ProcessId> {
        self.others.iter().copied().collect()
    }

    /// Drops `id` from both views. Returns false if it was not a member.
    pub fn remove(&mut self, id: ProcessId) -> bool {
        let before = self.all.len();
        self.all.retain(|&p| p != id);
        self.others.retain(|&p| p != id);
        before != self.all.len()
    }
}
