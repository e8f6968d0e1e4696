//! Handle to a peer's connection actor.

use std::{fmt, sync::Arc};

use mapc_primitives::{
    ConnectionState, OutboundMessage, PeerAddress, ServiceRecord, SupportedFeatures,
};
use mapc_registry::RegistryEntry;
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
};
use tracing::{Instrument, debug, info_span};

use crate::{
    actor::{ConnectionActor, Input},
    config::ConnectionConfig,
    error::{CommandError, DiscoveryError},
    events::EventEmitter,
    machine::{FollowUp, Shared},
    traits::{MessageTransport, ServiceDiscovery},
};

/// Everything a connection needs to spawn its actor.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Runtime the actors are spawned on.
    pub runtime: Handle,
    pub discovery: Arc<dyn ServiceDiscovery>,
    pub transport: Arc<dyn MessageTransport>,
    pub events: EventEmitter,
    pub config: ConnectionConfig,
}

impl ConnectionContext {
    pub fn new(
        runtime: Handle,
        discovery: Arc<dyn ServiceDiscovery>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            runtime,
            discovery,
            transport,
            events: EventEmitter::default(),
            config: ConnectionConfig::default(),
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("config", &self.config)
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Cloneable handle to one peer's connection.
///
/// Commands are checked against the current state under the machine lock
/// and either rejected immediately or queued for the actor. Clones share
/// the same machine; the actor stops once the connection is shut down or
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    shared: Arc<Shared>,
    inbox: mpsc::Sender<Input>,
}

impl PeerConnection {
    /// Creates the connection in `Disconnected` and spawns its actor.
    pub fn spawn(address: PeerAddress, ctx: &ConnectionContext) -> Self {
        let (tx, rx) = mpsc::channel(ctx.config.inbox_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared::new(address, ctx.events.clone(), shutdown_tx));

        let actor = ConnectionActor::new(
            Arc::clone(&shared),
            rx,
            shutdown_rx,
            Arc::clone(&ctx.discovery),
            Arc::clone(&ctx.transport),
            ctx.config.clone(),
        );
        ctx.runtime
            .spawn(actor.run().instrument(info_span!("peer", %address)));

        Self { shared, inbox: tx }
    }

    pub fn address(&self) -> PeerAddress {
        self.shared.address
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Features resolved by the last successful discovery; empty unless connected.
    pub fn supported_features(&self) -> SupportedFeatures {
        self.shared.lock().features
    }

    /// Messages accepted but not yet handed to the transport.
    pub fn pending_messages(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_retired(&self) -> bool {
        self.shared.lock().retired
    }

    /// Requests a connection. Accepted in every state of a live connection;
    /// only `Disconnected` starts a new attempt.
    pub fn connect(&self) -> Result<(), CommandError> {
        let mut machine = self.shared.lock();
        if machine.retired {
            return Err(CommandError::Retired);
        }
        match machine.state {
            ConnectionState::Disconnected => {
                let generation = machine.generation + 1;
                self.enqueue(Input::Connect { generation })?;
                machine.generation = generation;
                machine.follow_up = None;
                self.shared
                    .transition(&mut machine, ConnectionState::Connecting);
            }
            ConnectionState::Connecting => {
                if machine.follow_up.take().is_some() {
                    debug!(address = %self.shared.address, "Connect cancels pending disconnect");
                }
            }
            ConnectionState::Connected => {}
            ConnectionState::Disconnecting => machine.follow_up = Some(FollowUp::Connect),
        }
        Ok(())
    }

    /// Requests a disconnect. Rejected when there is nothing to tear down.
    pub fn disconnect(&self) -> Result<(), CommandError> {
        let mut machine = self.shared.lock();
        if machine.retired {
            return Err(CommandError::Retired);
        }
        match machine.state {
            ConnectionState::Disconnected => Err(CommandError::InvalidState(machine.state)),
            ConnectionState::Disconnecting => {
                if machine.follow_up.take() == Some(FollowUp::Connect) {
                    Ok(())
                } else {
                    Err(CommandError::InvalidState(machine.state))
                }
            }
            ConnectionState::Connecting => {
                machine.follow_up = Some(FollowUp::Disconnect);
                Ok(())
            }
            ConnectionState::Connected => {
                let generation = machine.generation;
                self.enqueue(Input::Disconnect { generation })?;
                self.shared
                    .transition(&mut machine, ConnectionState::Disconnecting);
                Ok(())
            }
        }
    }

    /// Queues a message for transmission. Only accepted while connected.
    pub fn send_message(&self, message: OutboundMessage) -> Result<(), CommandError> {
        let mut machine = self.shared.lock();
        if machine.retired {
            return Err(CommandError::Retired);
        }
        if !machine.state.is_connected() {
            return Err(CommandError::InvalidState(machine.state));
        }
        machine.pending.push_back(message);
        if let Err(err) = self.enqueue(Input::Flush) {
            machine.pending.pop_back();
            return Err(err);
        }
        Ok(())
    }

    /// Delivers the outcome of a service discovery started by this connection.
    pub fn on_service_discovered(
        &self,
        outcome: Result<ServiceRecord, DiscoveryError>,
    ) -> Result<(), CommandError> {
        self.deliver(Input::ServiceDiscovered(outcome))
    }

    /// Delivers loss of the underlying link.
    pub fn on_link_disconnected(&self) -> Result<(), CommandError> {
        self.deliver(Input::LinkLost)
    }

    /// Forces the machine to `Disconnected` and stops the actor. The actor
    /// releases any live session on its way out. Idempotent.
    pub fn shutdown(&self) {
        self.retire_when(|_| true);
    }

    /// Retires the connection only if it is currently `Disconnected`,
    /// atomically with respect to [`connect`](Self::connect).
    pub fn shutdown_if_idle(&self) -> bool {
        self.retire_when(|state| state.is_stale())
    }

    fn retire_when(&self, condition: impl FnOnce(ConnectionState) -> bool) -> bool {
        {
            let mut machine = self.shared.lock();
            if machine.retired {
                return true;
            }
            if !condition(machine.state) {
                return false;
            }
            machine.retired = true;
            machine.generation += 1;
            machine.follow_up = None;
            self.shared
                .transition(&mut machine, ConnectionState::Disconnected);
        }
        debug!(address = %self.shared.address, "Connection retired");
        self.shared.signal_shutdown();
        true
    }

    fn deliver(&self, input: Input) -> Result<(), CommandError> {
        if self.is_retired() {
            return Err(CommandError::Retired);
        }
        self.enqueue(input)
    }

    fn enqueue(&self, input: Input) -> Result<(), CommandError> {
        self.inbox.try_send(input).map_err(|err| match err {
            TrySendError::Full(_) => CommandError::InboxFull,
            TrySendError::Closed(_) => CommandError::Retired,
        })
    }
}

impl RegistryEntry for PeerConnection {
    fn connection_state(&self) -> ConnectionState {
        self.state()
    }

    fn retire_if_stale(&self) -> bool {
        self.shutdown_if_idle()
    }

    fn retire(&self) {
        self.shutdown();
    }
}
