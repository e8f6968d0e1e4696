//! Connection events and non-blocking broadcast emitter.

use mapc_primitives::{ConnectionState, PeerAddress, SupportedFeatures};
use tokio::sync::broadcast;

/// Notifications emitted by connection actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged {
        address: PeerAddress,
        old_state: ConnectionState,
        new_state: ConnectionState,
    },
    FeaturesResolved {
        address: PeerAddress,
        features: SupportedFeatures,
    },
    MessageSent { address: PeerAddress },
    MessageFailed {
        address: PeerAddress,
        reason: String,
    },
}

impl ConnectionEvent {
    pub fn address(&self) -> PeerAddress {
        match self {
            Self::StateChanged { address, .. }
            | Self::FeaturesResolved { address, .. }
            | Self::MessageSent { address }
            | Self::MessageFailed { address, .. } => *address,
        }
    }

    /// The new state if this is a transition event.
    pub fn new_state(&self) -> Option<ConnectionState> {
        match self {
            Self::StateChanged { new_state, .. } => Some(*new_state),
            _ => None,
        }
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ConnectionEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn state_changed(
        &self,
        address: PeerAddress,
        old_state: ConnectionState,
        new_state: ConnectionState,
    ) {
        self.emit(ConnectionEvent::StateChanged {
            address,
            old_state,
            new_state,
        });
    }

    pub fn features_resolved(&self, address: PeerAddress, features: SupportedFeatures) {
        self.emit(ConnectionEvent::FeaturesResolved { address, features });
    }

    pub fn message_sent(&self, address: PeerAddress) {
        self.emit(ConnectionEvent::MessageSent { address });
    }

    pub fn message_failed(&self, address: PeerAddress, reason: String) {
        self.emit(ConnectionEvent::MessageFailed { address, reason });
    }
}
