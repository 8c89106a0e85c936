use crate::order::LamportClock;
use std::fmt;

/// Identity handed out by the channel on join. Ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proc-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageKind {
    Enter,
    Allow,
    Release,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enter => "ENTER",
            Self::Allow => "ALLOW",
            Self::Release => "RELEASE",
        })
    }
}

/// Protocol message. Field order gives the derived total order: timestamp first,
/// then sender as tie-break. The kind only separates messages that would
/// otherwise compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Message {
    pub timestamp: LamportClock,
    pub sender: ProcessId,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(timestamp: LamportClock, sender: ProcessId, kind: MessageKind) -> Self {
        Self {
            timestamp,
            sender,
            kind,
        }
    }

    pub fn is_enter_from(&self, id: ProcessId) -> bool {
        self.kind == MessageKind::Enter && self.sender == id
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Clock {}, {}, {})", self.timestamp, self.sender, self.kind)
    }
}
