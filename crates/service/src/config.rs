//! Service configuration.

use std::{path::PathBuf, time::Duration};

use mapc_connection::ConnectionConfig;
use serde::{Deserialize, Serialize};

/// Runtime configuration of [`MapClientService`](crate::MapClientService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on simultaneously tracked peers.
    pub max_concurrent: usize,
    /// Per-connection inbox size.
    pub inbox_capacity: usize,
    /// Buffered connection events per subscriber.
    pub event_channel_capacity: usize,
    pub connect_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
    /// Remove entries as soon as they reach `Disconnected` instead of
    /// waiting for a sweep.
    pub reclaim_on_disconnect: bool,
    /// JSON file backing the policy store. In-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            max_concurrent: 4,
            inbox_capacity: connection.inbox_capacity,
            event_channel_capacity: 256,
            connect_timeout_ms: duration_ms(connection.connect_timeout),
            disconnect_timeout_ms: duration_ms(connection.disconnect_timeout),
            reclaim_on_disconnect: false,
            policy_file: None,
        }
    }
}

impl ServiceConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            inbox_capacity: self.inbox_capacity,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
