use auto_impl::auto_impl;
use mapc_primitives::{
    ConnectionPolicy, ConnectionState, OutboundMessage, PeerAddress, SupportedFeatures,
};

/// Caller-facing MAP client surface.
///
/// Every command answers with an acceptance verdict, never a completion
/// result. Progress is observed through [`connection_state`](Self::connection_state)
/// or connection events.
#[auto_impl(&, Box, Arc)]
pub trait MapClient: Send + Sync {
    /// Starts connecting unless the peer's policy forbids it or the
    /// registry has no room.
    fn connect(&self, address: PeerAddress) -> bool;

    /// `false` when there is nothing to disconnect.
    fn disconnect(&self, address: PeerAddress) -> bool;

    /// `Disconnected` for unknown peers.
    fn connection_state(&self, address: PeerAddress) -> ConnectionState;

    fn connected_devices(&self) -> Vec<PeerAddress>;

    fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<PeerAddress>;

    /// Persists the policy, then connects on `Allowed` or disconnects on
    /// `Forbidden`. `Unknown` clears the stored entry. `false` only if the
    /// store could not be updated.
    fn set_connection_policy(&self, address: PeerAddress, policy: ConnectionPolicy) -> bool;

    fn connection_policy(&self, address: PeerAddress) -> ConnectionPolicy;

    /// Queues a message on a connected peer.
    fn send_message(&self, address: PeerAddress, message: OutboundMessage) -> bool;

    /// Empty unless the peer is connected.
    fn supported_features(&self, address: PeerAddress) -> SupportedFeatures;
}
