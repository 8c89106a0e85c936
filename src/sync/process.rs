use super::error::MutexError;
use super::failure::FailureDetector;
use super::membership::Membership;
use super::message::{Message, MessageKind, ProcessId};
use super::queue::RequestQueue;
use crate::channel::Channel;
use crate::config::Config;
use crate::order::{LamportClock, OrdProcess};
use crate::time::{SystemClock, WallClock};
use rand::{rngs::StdRng, Rng};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Only active processes ever ask for the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Requesting,
    InCs,
    Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsEvent {
    Entered { id: ProcessId, clock: LamportClock },
    Exited { id: ProcessId, clock: LamportClock },
}

/// Cancellation flag shared between a running process and whoever owns its lifetime.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Observer = Box<dyn FnMut(CsEvent) + Send>;

/// One peer of the fully distributed mutex.
///
/// Every message is stamped with a Lamport clock and kept in a local queue sorted
/// by `(timestamp, sender)`. A process may enter the critical section once its own
/// ENTER heads that queue and every other current member has sent it something
/// ordered later (an ENTER or an ALLOW). RELEASE purges the holder's ENTER from
/// the head of everybody's queue. Peers that stay silent longer than the failure
/// timeout are dropped from the membership, shrinking the quorum.
pub struct MutexProcess<C, R = StdRng, W = SystemClock> {
    channel: C,
    id: ProcessId,
    name: String,
    role: Role,
    clock: LamportClock,
    queue: RequestQueue,
    membership: Membership,
    detector: FailureDetector,
    state: ProcessState,
    rng: R,
    wall: W,
    config: Config,
    observer: Option<Observer>,
}

impl<C, R, W> OrdProcess<LamportClock> for MutexProcess<C, R, W> {
    fn clock(&self) -> LamportClock {
        self.clock
    }
    fn set_clock(&mut self, e: LamportClock) {
        self.clock = e;
    }
}

impl<C, R, W> MutexProcess<C, R, W>
where
    C: Channel,
    R: Rng,
    W: WallClock,
{
    /// Joins the configured group. The membership view stays empty until [`Self::init`].
    pub fn new(mut channel: C, config: Config, rng: R, wall: W) -> Result<Self, MutexError> {
        let id = channel.join(&config.group)?;
        Ok(Self {
            channel,
            id,
            name: "unassigned".to_owned(),
            role: Role::Passive,
            clock: LamportClock::default(),
            queue: RequestQueue::new(),
            membership: Membership::default(),
            detector: FailureDetector::new(config.failure_timeout),
            state: ProcessState::Idle,
            rng,
            wall,
            config,
            observer: None,
        })
    }

    pub fn init(&mut self, name: impl Into<String>, role: Role) -> Result<(), MutexError> {
        self.channel.bind(self.id)?;
        let members = self.channel.subgroup(&self.config.group)?;
        self.membership = Membership::new(self.id, members);
        self.name = name.into();
        self.role = role;
        info!(name = %self.name, id = %self.id, ?role, members = self.membership.all().len(), "joined channel");
        Ok(())
    }

    pub fn on_critical_section<F>(&mut self, f: F)
    where
        F: FnMut(CsEvent) + Send + 'static,
    {
        self.observer = Some(Box::new(f));
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn state(&self) -> ProcessState {
        self.state
    }
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn run(&mut self, stop: &StopSignal) -> Result<(), MutexError> {
        while !stop.is_stopped() {
            self.step(stop)?;
        }
        info!(id = %self.id, clock = %self.clock, "stopped");
        Ok(())
    }

    /// One iteration of the control loop: either a full request, CS, release
    /// round, or at most one serviced message.
    pub fn step(&mut self, stop: &StopSignal) -> Result<(), MutexError> {
        // A request interrupted by a stop is still known to the peers, so resume it
        if self.state == ProcessState::Requesting || self.wants_to_enter() {
            self.request_to_enter()?;
            while !self.allowed_to_enter() {
                if stop.is_stopped() {
                    info!(id = %self.id, queue = %self.queue, "stopped while waiting for CS, request stays pending");
                    return Ok(());
                }
                self.receive()?;
            }
            self.critical_section();
            return self.release();
        }

        // Occasionally serve requests of others
        if self.rng.gen_bool(0.5) {
            self.receive()?;
        }
        Ok(())
    }

    fn wants_to_enter(&mut self) -> bool {
        self.role == Role::Active && self.membership.all().len() > 1 && self.rng.gen_bool(0.5)
    }

    /// Broadcasts an ENTER. No-op while an earlier request is still pending.
    pub fn request_to_enter(&mut self) -> Result<(), MutexError> {
        if self.state == ProcessState::Requesting {
            debug!(id = %self.id, queue = %self.queue, "ENTER already pending");
            return Ok(());
        }
        debug!(id = %self.id, clock = %self.clock, "wants to ENTER CS");
        let id = self.id;
        let msg = self.send(|ts| Message::new(ts, id, MessageKind::Enter));
        self.queue.push(msg);
        self.queue.cleanup();
        self.state = ProcessState::Requesting;
        self.channel.send_to(self.membership.others(), msg)?;
        Ok(())
    }

    fn allow_to_enter(&mut self, requester: ProcessId) -> Result<(), MutexError> {
        let id = self.id;
        let msg = self.send(|ts| Message::new(ts, id, MessageKind::Allow));
        self.channel.send_to(&[requester], msg)?;
        Ok(())
    }

    /// Own ENTER first in the queue and a later message from every current peer.
    pub fn allowed_to_enter(&self) -> bool {
        self.queue.is_head_from(self.id)
            && self.queue.senders_after_head() == self.membership.others_set()
    }

    fn critical_section(&mut self) {
        self.state = ProcessState::InCs;
        let dwell = self.rng.gen_range(Duration::ZERO..=self.config.max_dwell);
        info!(id = %self.id, clock = %self.clock, dwell_ms = dwell.as_millis() as u64, "CS <- {}", self.id);
        self.notify(CsEvent::Entered {
            id: self.id,
            clock: self.clock,
        });
        std::thread::sleep(dwell);
        self.notify(CsEvent::Exited {
            id: self.id,
            clock: self.clock,
        });
        info!(id = %self.id, clock = %self.clock, "CS -> {}", self.id);
    }

    fn notify(&mut self, event: CsEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(event);
        }
    }

    /// Leaves the critical section. Own ENTER must still head the queue.
    pub fn release(&mut self) -> Result<(), MutexError> {
        if !self.queue.head().is_some_and(|m| m.is_enter_from(self.id)) {
            return Err(MutexError::InconsistentLocalRelease {
                id: self.id,
                head: self.queue.head().copied(),
            });
        }
        self.state = ProcessState::Releasing;
        self.queue.retain_later_enters();
        let id = self.id;
        let msg = self.send(|ts| Message::new(ts, id, MessageKind::Release));
        self.channel.send_to(self.membership.others(), msg)?;
        self.state = ProcessState::Idle;
        debug!(id = %self.id, clock = %self.clock, queue = %self.queue, "released CS");
        Ok(())
    }

    /// Services at most one message, then runs the failure detector.
    pub fn receive(&mut self) -> Result<(), MutexError> {
        let received = self
            .channel
            .receive_from(self.membership.others(), self.config.receive_timeout)?;
        match received {
            Some((_, msg)) => self.handle(msg)?,
            None => info!(id = %self.id, queue = %self.queue, "timed out on RECEIVE"),
        }
        self.check_for_failures()
    }

    fn handle(&mut self, msg: Message) -> Result<(), MutexError> {
        let sender = msg.sender;
        self.detector.observe(sender, self.wall.now());
        self.recv(&msg.timestamp);
        debug!(id = %self.id, clock = %self.clock, from = %sender, kind = %msg.kind, "received");

        match msg.kind {
            MessageKind::Enter => {
                self.queue.push(msg);
                // Own pending ENTER, if any, already orders before this one
                self.allow_to_enter(sender)?;
            }
            MessageKind::Allow => self.queue.push(msg),
            MessageKind::Release => {
                if !self.queue.head().is_some_and(|m| m.is_enter_from(sender)) {
                    return Err(MutexError::InconsistentRemoteRelease {
                        sender,
                        head: self.queue.head().copied(),
                    });
                }
                self.queue.pop_head();
            }
        }
        self.queue.cleanup();
        Ok(())
    }

    /// Drops every peer that stayed silent longer than the failure timeout.
    pub fn check_for_failures(&mut self) -> Result<(), MutexError> {
        let now = self.wall.now();
        for peer in self.detector.check(self.membership.others(), now) {
            warn!(id = %self.id, %peer, "process is considered crashed");
            self.membership.remove(peer);
            self.channel.forget(peer)?;
            let purged = self.queue.purge_sender(peer);
            if purged > 0 {
                debug!(id = %self.id, %peer, purged, "purged queued messages of crashed process");
            }
        }
        self.queue.cleanup();
        Ok(())
    }
}
