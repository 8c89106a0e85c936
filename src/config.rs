use std::time::Duration;

pub const GROUP: &str = "proc";
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);
// Silence after which a peer is presumed crashed
pub const FAILURE_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_DWELL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub group: String,
    pub receive_timeout: Duration,
    pub failure_timeout: Duration,
    /// Upper bound of the random time spent inside the critical section.
    pub max_dwell: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: GROUP.to_owned(),
            receive_timeout: RECEIVE_TIMEOUT,
            failure_timeout: FAILURE_TIMEOUT,
            max_dwell: MAX_DWELL,
        }
    }
}

impl Config {
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
    pub fn with_failure_timeout(mut self, timeout: Duration) -> Self {
        self.failure_timeout = timeout;
        self
    }
    pub fn with_max_dwell(mut self, dwell: Duration) -> Self {
        self.max_dwell = dwell;
        self
    }
}
