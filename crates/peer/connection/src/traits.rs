//! Seams to the platform stack the state machine drives.

use async_trait::async_trait;
use auto_impl::auto_impl;
use mapc_primitives::{OutboundMessage, PeerAddress, ServiceRecord};

use crate::error::TransportError;

/// Starts an SDP search for the message access service of a peer.
///
/// Fire-and-forget: the outcome comes back as a platform event routed to the
/// peer's connection.
#[auto_impl(&, Box, Arc)]
pub trait ServiceDiscovery: Send + Sync {
    fn start_discovery(&self, address: PeerAddress);
}

/// Lower-layer session to a peer's message access server.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn connect(
        &self,
        address: PeerAddress,
        record: &ServiceRecord,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self, address: PeerAddress) -> Result<(), TransportError>;

    async fn send_message(
        &self,
        address: PeerAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError>;
}
