use super::message::{Message, ProcessId};
use crate::channel::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MutexError {
    #[error("state error: inconsistent local RELEASE by {id}, queue head is {head:?}")]
    InconsistentLocalRelease { id: ProcessId, head: Option<Message> },
    #[error("state error: inconsistent remote RELEASE from {sender}, queue head is {head:?}")]
    InconsistentRemoteRelease {
        sender: ProcessId,
        head: Option<Message>,
    },
    #[error("channel failure: `{0}`")]
    Channel(#[from] ChannelError),
}

impl MutexError {
    /// True when the total order or quorum invariant was broken. The process
    /// must stop instead of trying to repair its queue.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Self::InconsistentLocalRelease { .. } | Self::InconsistentRemoteRelease { .. }
        )
    }
}
