use std::time::Duration;

const DEFAULT_INBOX_CAPACITY: usize = 32;

/// Matches the platform state machine's connecting/disconnecting timers.
const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bounded actor inbox size.
    pub inbox_capacity: usize,
    /// Upper bound for discovery plus lower-layer connect.
    pub connect_timeout: Duration,
    /// Upper bound for teardown before the machine is forced to `Disconnected`.
    pub disconnect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            connect_timeout: DEFAULT_STATE_TIMEOUT,
            disconnect_timeout: DEFAULT_STATE_TIMEOUT,
        }
    }
}
