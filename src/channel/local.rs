//! In-memory channel for processes living on threads of the same program.

use super::{Channel, ChannelError};
use crate::sync::message::{Message, ProcessId};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    arrived: Condvar,
}

#[derive(Default)]
struct State {
    next_id: u64,
    groups: HashMap<String, BTreeSet<ProcessId>>,
    inboxes: HashMap<ProcessId, VecDeque<(ProcessId, Message)>>,
    // receiver -> senders it no longer listens to
    forgotten: HashMap<ProcessId, HashSet<ProcessId>>,
}

/// Hub every [`LocalChannel`] of one simulation is created from.
#[derive(Clone, Default)]
pub struct LocalGroup(Arc<Shared>);

impl LocalGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> LocalChannel {
        LocalChannel {
            shared: self.0.clone(),
            bound: None,
        }
    }
}

pub struct LocalChannel {
    shared: Arc<Shared>,
    bound: Option<ProcessId>,
}

impl LocalChannel {
    fn me(&self) -> Result<ProcessId, ChannelError> {
        self.bound.ok_or(ChannelError::NotBound)
    }
}

impl Channel for LocalChannel {
    fn join(&mut self, group: &str) -> Result<ProcessId, ChannelError> {
        let mut state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        state.next_id += 1;
        let id = ProcessId(state.next_id);
        state.groups.entry(group.to_owned()).or_default().insert(id);
        state.inboxes.entry(id).or_default();
        Ok(id)
    }

    fn bind(&mut self, id: ProcessId) -> Result<(), ChannelError> {
        let state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        if !state.inboxes.contains_key(&id) {
            return Err(ChannelError::UnknownMember(id));
        }
        self.bound = Some(id);
        Ok(())
    }

    fn subgroup(&self, group: &str) -> Result<BTreeSet<ProcessId>, ChannelError> {
        let state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        state
            .groups
            .get(group)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownGroup(group.to_owned()))
    }

    fn send_to(&self, targets: &[ProcessId], message: Message) -> Result<(), ChannelError> {
        let me = self.me()?;
        let mut state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        for target in targets {
            if state.forgotten.get(target).is_some_and(|f| f.contains(&me)) {
                trace!(from = %me, to = %target, "dropping message to member that forgot sender");
                continue;
            }
            match state.inboxes.get_mut(target) {
                Some(inbox) => inbox.push_back((me, message)),
                None => trace!(from = %me, to = %target, "dropping message to unknown member"),
            }
        }
        self.shared.arrived.notify_all();
        Ok(())
    }

    fn receive_from(
        &self,
        sources: &[ProcessId],
        timeout: Duration,
    ) -> Result<Option<(ProcessId, Message)>, ChannelError> {
        let me = self.me()?;
        // No deadline at all when the timeout does not fit into an Instant
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        loop {
            let inbox = state
                .inboxes
                .get_mut(&me)
                .ok_or(ChannelError::UnknownMember(me))?;
            // First pending message from a wanted source keeps per-sender FIFO order
            if let Some(pos) = inbox.iter().position(|(from, _)| sources.contains(from)) {
                return Ok(inbox.remove(pos));
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.shared
                        .arrived
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| ChannelError::Poisoned)?
                        .0
                }
                None => self
                    .shared
                    .arrived
                    .wait(state)
                    .map_err(|_| ChannelError::Poisoned)?,
            };
        }
    }

    fn forget(&self, peer: ProcessId) -> Result<(), ChannelError> {
        let me = self.me()?;
        let mut state = self.shared.state.lock().map_err(|_| ChannelError::Poisoned)?;
        if let Some(inbox) = state.inboxes.get_mut(&me) {
            inbox.retain(|(from, _)| *from != peer);
        }
        state.forgotten.entry(me).or_default().insert(peer);
        Ok(())
    }
}

#[cfg(test)]
impl LocalChannel {
    pub(crate) fn pending(&self) -> usize {
        let (Some(me), Ok(state)) = (self.bound, self.shared.state.lock()) else {
            return 0;
        };
        let n = state.inboxes.get(&me).map_or(0, VecDeque::len);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::LocalGroup;
    use crate::channel::{Channel, ChannelError};
    use crate::order::LamportClock;
    use crate::sync::message::{Message, MessageKind, ProcessId};
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(20);

    fn msg(t: u64, id: ProcessId) -> Message {
        Message::new(LamportClock::new(t), id, MessageKind::Enter)
    }

    #[test]
    fn join_assigns_increasing_ids() {
        let group = LocalGroup::new();
        let (mut a, mut b) = (group.channel(), group.channel());
        let ia = a.join("proc").unwrap();
        let ib = b.join("proc").unwrap();
        assert!(ia < ib);
        assert_eq!(a.subgroup("proc").unwrap().into_iter().collect::<Vec<_>>(), vec![ia, ib]);
        assert_eq!(
            a.subgroup("other"),
            Err(ChannelError::UnknownGroup("other".to_owned()))
        );
    }

    #[test]
    fn unbound_endpoint_cannot_send() {
        let group = LocalGroup::new();
        let mut a = group.channel();
        let id = a.join("proc").unwrap();
        assert_eq!(a.send_to(&[id], msg(1, id)), Err(ChannelError::NotBound));
        assert_eq!(
            a.bind(ProcessId(99)),
            Err(ChannelError::UnknownMember(ProcessId(99)))
        );
    }

    #[test]
    fn receive_filters_sources_and_keeps_fifo() {
        let group = LocalGroup::new();
        let (mut a, mut b, mut c) = (group.channel(), group.channel(), group.channel());
        let (ia, ib, ic) = (a.join("p").unwrap(), b.join("p").unwrap(), c.join("p").unwrap());
        a.bind(ia).unwrap();
        b.bind(ib).unwrap();
        c.bind(ic).unwrap();

        b.send_to(&[ia], msg(1, ib)).unwrap();
        c.send_to(&[ia], msg(2, ic)).unwrap();
        b.send_to(&[ia, ProcessId(42)], msg(3, ib)).unwrap();

        // c's message is skipped, not lost
        assert_eq!(a.receive_from(&[ib], TICK).unwrap(), Some((ib, msg(1, ib))));
        assert_eq!(a.receive_from(&[ib], TICK).unwrap(), Some((ib, msg(3, ib))));
        assert_eq!(a.receive_from(&[ib], TICK).unwrap(), None);
        assert_eq!(a.receive_from(&[ib, ic], TICK).unwrap(), Some((ic, msg(2, ic))));
    }

    #[test]
    fn receive_wakes_on_send() {
        let group = LocalGroup::new();
        let (mut a, mut b) = (group.channel(), group.channel());
        let (ia, ib) = (a.join("p").unwrap(), b.join("p").unwrap());
        a.bind(ia).unwrap();
        b.bind(ib).unwrap();

        let th = std::thread::spawn(move || a.receive_from(&[ib], Duration::from_secs(5)));
        std::thread::sleep(TICK);
        b.send_to(&[ia], msg(7, ib)).unwrap();
        assert_eq!(th.join().unwrap().unwrap(), Some((ib, msg(7, ib))));
    }

    #[test]
    fn unbounded_timeout_still_delivers() {
        let group = LocalGroup::new();
        let (mut a, mut b) = (group.channel(), group.channel());
        let (ia, ib) = (a.join("p").unwrap(), b.join("p").unwrap());
        a.bind(ia).unwrap();
        b.bind(ib).unwrap();

        b.send_to(&[ia], msg(1, ib)).unwrap();
        assert_eq!(a.receive_from(&[ib], Duration::MAX).unwrap(), Some((ib, msg(1, ib))));

        let th = std::thread::spawn(move || a.receive_from(&[ib], Duration::MAX));
        std::thread::sleep(TICK);
        b.send_to(&[ia], msg(2, ib)).unwrap();
        assert_eq!(th.join().unwrap().unwrap(), Some((ib, msg(2, ib))));
    }

    #[test]
    fn forget_drops_queued_and_later_messages() {
        let group = LocalGroup::new();
        let (mut a, mut b, mut c) = (group.channel(), group.channel(), group.channel());
        let (ia, ib, ic) = (a.join("p").unwrap(), b.join("p").unwrap(), c.join("p").unwrap());
        a.bind(ia).unwrap();
        b.bind(ib).unwrap();
        c.bind(ic).unwrap();

        b.send_to(&[ia], msg(1, ib)).unwrap();
        c.send_to(&[ia], msg(2, ic)).unwrap();
        assert_eq!(a.pending(), 2);

        a.forget(ic).unwrap();
        assert_eq!(a.pending(), 1);
        c.send_to(&[ia, ib], msg(3, ic)).unwrap();
        assert_eq!(a.pending(), 1);
        // only the forgetting endpoint stops hearing c
        assert_eq!(b.pending(), 1);
        assert_eq!(a.receive_from(&[ib, ic], TICK).unwrap(), Some((ib, msg(1, ib))));
        assert_eq!(a.receive_from(&[ib, ic], TICK).unwrap(), None);
    }
}
