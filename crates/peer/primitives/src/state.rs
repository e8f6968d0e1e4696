//! Connection lifecycle states.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Per-peer connection state.
///
/// A connection only moves forward through the sequence, or collapses
/// straight to `Disconnected` on failure or teardown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Eligible for eviction from a registry.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}
