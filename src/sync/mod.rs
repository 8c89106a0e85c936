//! Fully distributed mutual exclusion over broadcast and Lamport clocks.
//!
//! The requirements are
//! 1. Mutual Exclusion - a process enters only when its request is the oldest one it
//!    knows of and every other live member has answered with something younger.
//! 2. Progress despite crashes - members silent for too long stop counting towards
//!    the quorum, at the cost of possibly disagreeing with their peers about it.
pub mod error;
pub mod failure;
pub mod membership;
pub mod message;
pub mod process;
pub mod queue;

pub use error::MutexError;
pub use message::{Message, MessageKind, ProcessId};
pub use process::{CsEvent, MutexProcess, ProcessState, Role, StopSignal};
pub use queue::RequestQueue;
