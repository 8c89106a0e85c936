//! Group communication the mutex runs on top of.
//!
//! The channel owns membership bookkeeping and message delivery. Ordering,
//! reliability and duplicate handling are whatever the implementation offers;
//! the mutex only assumes messages from one sender arrive in the order they
//! were sent.

pub mod local;

use crate::sync::message::{Message, ProcessId};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("endpoint is not bound to a process id")]
    NotBound,
    #[error("`{0}` never joined this channel")]
    UnknownMember(ProcessId),
    #[error("no such group: `{0}`")]
    UnknownGroup(String),
    #[error("channel state poisoned by a panicking member")]
    Poisoned,
}

pub trait Channel {
    /// Registers the caller in `group` and returns its freshly assigned id.
    fn join(&mut self, group: &str) -> Result<ProcessId, ChannelError>;
    /// Associates this endpoint with `id` for all later sends and receives.
    fn bind(&mut self, id: ProcessId) -> Result<(), ChannelError>;
    fn subgroup(&self, group: &str) -> Result<BTreeSet<ProcessId>, ChannelError>;
    /// Best effort, fire and forget. Unknown targets are skipped.
    fn send_to(&self, targets: &[ProcessId], message: Message) -> Result<(), ChannelError>;
    /// Waits at most `timeout` for a message from any of `sources`. `Ok(None)` on timeout.
    fn receive_from(
        &self,
        sources: &[ProcessId],
        timeout: Duration,
    ) -> Result<Option<(ProcessId, Message)>, ChannelError>;
    /// Stops delivery from `peer` to this endpoint, dropping whatever it already queued.
    fn forget(&self, _peer: ProcessId) -> Result<(), ChannelError> {
        Ok(())
    }
}
