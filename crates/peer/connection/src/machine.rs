//! Shared state of one peer's connection machine.

use std::collections::VecDeque;

use mapc_primitives::{ConnectionState, OutboundMessage, PeerAddress, SupportedFeatures};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

use crate::events::EventEmitter;

/// Intent recorded while a transition is in flight and applied once it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    Connect,
    Disconnect,
}

/// Mutable machine state. Only mutated with the owning [`Shared`] lock held.
#[derive(Debug, Default)]
pub(crate) struct Machine {
    pub(crate) state: ConnectionState,
    /// Bumped on every new connection attempt and on shutdown. Actor work
    /// carrying an older generation is discarded.
    pub(crate) generation: u64,
    pub(crate) follow_up: Option<FollowUp>,
    pub(crate) pending: VecDeque<OutboundMessage>,
    pub(crate) features: SupportedFeatures,
    pub(crate) retired: bool,
}

/// State shared between a connection's handles and its actor.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) address: PeerAddress,
    machine: Mutex<Machine>,
    events: EventEmitter,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    pub(crate) fn new(
        address: PeerAddress,
        events: EventEmitter,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            address,
            machine: Mutex::new(Machine::default()),
            events,
            shutdown,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock()
    }

    pub(crate) fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Moves the machine to `new_state` and publishes the change.
    ///
    /// Entering `Disconnected` clears resolved features and drops queued
    /// messages. Follow-up intents are left to the caller.
    pub(crate) fn transition(&self, machine: &mut Machine, new_state: ConnectionState) {
        let old_state = machine.state;
        if old_state == new_state {
            return;
        }
        machine.state = new_state;
        if new_state == ConnectionState::Disconnected {
            machine.features = SupportedFeatures::empty();
            if !machine.pending.is_empty() {
                debug!(
                    dropped = machine.pending.len(),
                    "Discarding queued messages"
                );
                machine.pending.clear();
            }
        }
        let address = self.address;
        debug!(%address, %old_state, %new_state, "Connection state changed");
        self.events.state_changed(address, old_state, new_state);
    }

    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ConnectionEvent;

    fn shared() -> Shared {
        let (tx, _rx) = watch::channel(false);
        Shared::new(
            PeerAddress::new([1, 2, 3, 4, 5, 6]),
            EventEmitter::default(),
            tx,
        )
    }

    #[test]
    fn test_transition_emits_once() {
        let shared = shared();
        let mut rx = shared.events().subscribe();

        let mut machine = shared.lock();
        shared.transition(&mut machine, ConnectionState::Connecting);
        shared.transition(&mut machine, ConnectionState::Connecting);
        drop(machine);

        assert_eq!(
            rx.try_recv().unwrap(),
            ConnectionEvent::StateChanged {
                address: shared.address,
                old_state: ConnectionState::Disconnected,
                new_state: ConnectionState::Connecting,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_clears_features_and_pending() {
        let shared = shared();
        let mut machine = shared.lock();
        shared.transition(&mut machine, ConnectionState::Connected);
        machine.features = SupportedFeatures::BROWSING;
        machine.pending.push_back(OutboundMessage::new(["1"], "a"));
        machine.follow_up = Some(FollowUp::Connect);

        shared.transition(&mut machine, ConnectionState::Disconnected);

        assert!(machine.features.is_empty());
        assert!(machine.pending.is_empty());
        assert_eq!(machine.follow_up, Some(FollowUp::Connect));
    }
}
