//! Routes platform notifications to the owning peer connection.

use std::sync::Arc;

use mapc_connection::{CommandError, DiscoveryError, PeerConnection};
use mapc_primitives::{PeerAddress, ServiceRecord};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::{metrics::RouterMetrics, service::PeerRegistry};

/// Asynchronous notification from the platform stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The link-layer connection to the peer went away.
    LinkDisconnected(PeerAddress),
    /// An SDP search started for the peer completed.
    ServiceDiscovered {
        address: PeerAddress,
        outcome: Result<ServiceRecord, DiscoveryError>,
    },
    /// The peer was unpaired.
    BondRemoved(PeerAddress),
}

impl PlatformEvent {
    pub fn address(&self) -> PeerAddress {
        match self {
            Self::LinkDisconnected(address)
            | Self::ServiceDiscovered { address, .. }
            | Self::BondRemoved(address) => *address,
        }
    }
}

/// What happened to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the peer's connection.
    Delivered,
    /// The bonded peer's idle entry was removed.
    Removed,
    /// No registry entry for the peer.
    UnknownPeer,
    /// The entry exists but could not take the event.
    Dropped,
}

/// Looks up the peer's connection and forwards the event to it.
///
/// The connection handle is cloned out of the registry before the event is
/// delivered, so the registry lock is never held across delivery.
#[derive(Debug, Clone)]
pub struct EventRouter {
    registry: Arc<PeerRegistry>,
    metrics: RouterMetrics,
}

impl EventRouter {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self {
            registry,
            metrics: RouterMetrics::default(),
        }
    }

    pub fn route(&self, event: PlatformEvent) -> RouteOutcome {
        match event {
            PlatformEvent::LinkDisconnected(address) => {
                self.deliver(address, |peer| peer.on_link_disconnected())
            }
            PlatformEvent::ServiceDiscovered { address, outcome } => {
                self.deliver(address, move |peer| peer.on_service_discovered(outcome))
            }
            PlatformEvent::BondRemoved(address) => self.remove_unbonded(address),
        }
    }

    fn deliver(
        &self,
        address: PeerAddress,
        forward: impl FnOnce(&PeerConnection) -> Result<(), CommandError>,
    ) -> RouteOutcome {
        let Some(connection) = self.registry.lookup(&address) else {
            self.unknown_peer(address);
            return RouteOutcome::UnknownPeer;
        };

        match forward(&connection) {
            Ok(()) => RouteOutcome::Delivered,
            Err(CommandError::Retired) => {
                trace!(%address, "Connection retired, dropping event");
                RouteOutcome::Dropped
            }
            Err(err) => {
                warn!(%address, %err, "Dropping platform event");
                RouteOutcome::Dropped
            }
        }
    }

    /// Drops the entry of an unpaired peer unless it is still in use.
    fn remove_unbonded(&self, address: PeerAddress) -> RouteOutcome {
        let idle = PeerConnection::shutdown_if_idle;
        if self.registry.remove_if(&address, idle).is_some() {
            debug!(%address, "Removed entry of unbonded peer");
            RouteOutcome::Removed
        } else if self.registry.contains(&address) {
            trace!(%address, "Unbonded peer still active, keeping entry");
            RouteOutcome::Dropped
        } else {
            self.unknown_peer(address);
            RouteOutcome::UnknownPeer
        }
    }

    /// Routes events until the sending side closes.
    pub async fn run(self, mut events: mpsc::Receiver<PlatformEvent>) {
        while let Some(event) = events.recv().await {
            self.route(event);
        }
        debug!("Platform event channel closed");
    }

    fn unknown_peer(&self, address: PeerAddress) {
        debug!(%address, "Event for unknown peer dropped");
        self.metrics.inc_unknown_peer();
    }
}
