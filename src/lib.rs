pub mod channel;
pub mod config;
pub mod order;
pub mod sync;
pub mod time;
