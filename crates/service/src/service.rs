//! Service facade over the connection registry.

use std::sync::Arc;

use mapc_connection::{
    CommandError, ConnectionContext, ConnectionEvent, EventEmitter, MessageTransport,
    PeerConnection, ServiceDiscovery,
};
use mapc_primitives::{
    ConnectionPolicy, ConnectionState, OutboundMessage, PeerAddress, SupportedFeatures,
};
use mapc_registry::{Admission, ConnectionRegistry};
use parking_lot::RwLock;
use tokio::{
    runtime::Handle,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    api::MapClient,
    config::ServiceConfig,
    error::ServiceError,
    metrics::ServiceMetrics,
    policy::PolicyStore,
    router::{EventRouter, PlatformEvent},
};

/// Registry of per-peer connections keyed by address.
pub type PeerRegistry = ConnectionRegistry<PeerAddress, PeerConnection>;

/// State that only exists between `start` and `stop`.
#[derive(Debug)]
struct Running {
    ctx: ConnectionContext,
    tasks: Vec<JoinHandle<()>>,
}

/// MAP client connection manager.
///
/// Owns the connection registry for the lifetime of the service. Commands
/// are answered synchronously with an acceptance verdict; the work itself
/// runs on per-peer actors spawned on the runtime captured by
/// [`start`](Self::start).
pub struct MapClientService {
    config: ServiceConfig,
    registry: Arc<PeerRegistry>,
    policies: Arc<dyn PolicyStore>,
    discovery: Arc<dyn ServiceDiscovery>,
    transport: Arc<dyn MessageTransport>,
    events: EventEmitter,
    running: RwLock<Option<Running>>,
    metrics: ServiceMetrics,
}

impl MapClientService {
    pub fn new(
        config: ServiceConfig,
        discovery: Arc<dyn ServiceDiscovery>,
        transport: Arc<dyn MessageTransport>,
        policies: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(config.max_concurrent)),
            events: EventEmitter::new(config.event_channel_capacity),
            config,
            policies,
            discovery,
            transport,
            running: RwLock::new(None),
            metrics: ServiceMetrics::default(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Router feeding platform events into this service's connections.
    pub fn router(&self) -> EventRouter {
        EventRouter::new(Arc::clone(&self.registry))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.read().is_some()
    }

    /// Starts the service on `runtime`. Stale entries are swept and, when
    /// configured, the disconnect reclaimer is started. No-op if running.
    pub fn start(&self, runtime: Handle) {
        let mut running = self.running.write();
        if running.is_some() {
            return;
        }

        let swept = self.registry.evict_stale();
        let ctx = ConnectionContext::new(
            runtime.clone(),
            Arc::clone(&self.discovery),
            Arc::clone(&self.transport),
        )
        .with_events(self.events.clone())
        .with_config(self.config.connection_config());

        let mut tasks = Vec::new();
        if self.config.reclaim_on_disconnect {
            let events = self.events.subscribe();
            let reclaimer = reclaim_disconnected(Arc::clone(&self.registry), events);
            let reclaimer = reclaimer.instrument(info_span!("reclaimer"));
            tasks.push(runtime.spawn(reclaimer));
        }

        *running = Some(Running { ctx, tasks });
        info!(
            capacity = self.registry.capacity(),
            swept,
            reclaim = self.config.reclaim_on_disconnect,
            "MAP client service started"
        );
    }

    /// Spawns a router task consuming `events` until the channel closes or
    /// the service stops.
    pub fn attach_platform_events(
        &self,
        events: mpsc::Receiver<PlatformEvent>,
    ) -> Result<(), ServiceError> {
        let mut running = self.running.write();
        let running = running.as_mut().ok_or(ServiceError::NotRunning)?;
        let router = self.router().run(events).instrument(info_span!("router"));
        running.tasks.push(running.ctx.runtime.spawn(router));
        Ok(())
    }

    /// Forces every connection down, empties the registry and stops
    /// background tasks. No-op if not running.
    pub fn stop(&self) {
        let Some(running) = self.running.write().take() else {
            return;
        };
        for task in running.tasks {
            task.abort();
        }
        let retired = self.registry.drain();
        info!(retired, "MAP client service stopped");
    }

    pub fn try_connect(&self, address: PeerAddress) -> Result<(), ServiceError> {
        let running = self.running.read();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;

        if !self.policy_or_unknown(address).permits_connect() {
            warn!(%address, "Connect rejected by policy");
            self.metrics.inc_policy_rejected();
            return Err(ServiceError::PolicyRejected(address));
        }

        // An entry can be evicted between lookup and use; the second pass
        // then admits a fresh one.
        let spawn = |address: &PeerAddress| PeerConnection::spawn(*address, &running.ctx);
        let mut last_err = CommandError::Retired;
        for _ in 0..2 {
            let admission = self.registry.get_or_create(address, spawn);
            let connection = match admission {
                Admission::Existing(connection) | Admission::Created(connection) => connection,
                Admission::Rejected => {
                    self.metrics.inc_capacity_rejected();
                    return Err(ServiceError::CapacityExceeded {
                        capacity: self.registry.capacity(),
                    });
                }
            };

            match connection.connect() {
                Ok(()) => {
                    debug!(%address, state = %connection.state(), "Connect accepted");
                    self.metrics.inc_connect_accepted();
                    return Ok(());
                }
                Err(CommandError::Retired) => continue,
                Err(err) => {
                    last_err = err;
                    break;
                }
            }
        }
        warn!(%address, err = %last_err, "Connect rejected");
        Err(last_err.into())
    }

    pub fn try_disconnect(&self, address: PeerAddress) -> Result<(), ServiceError> {
        let connection = self.running_lookup(address)?;
        connection.disconnect().map_err(|err| {
            debug!(%address, %err, "Nothing to disconnect");
            err.into()
        })
    }

    pub fn try_send_message(
        &self,
        address: PeerAddress,
        message: OutboundMessage,
    ) -> Result<(), ServiceError> {
        if !message.is_valid() {
            return Err(ServiceError::InvalidMessage);
        }
        let connection = self.running_lookup(address)?;
        connection.send_message(message).map_err(|err| {
            debug!(%address, %err, "Message rejected");
            err.into()
        })
    }

    /// Human-readable view of every tracked connection.
    pub fn dump(&self) -> String {
        let entries = self.registry.entries();
        let mut out = format!(
            "MapClientService: running={} entries={}/{}\n",
            self.is_running(),
            entries.len(),
            self.registry.capacity()
        );
        for (address, connection) in entries {
            out.push_str(&format!(
                "  {address}: state={} features={:#010x} pending={} policy={}\n",
                connection.state(),
                connection.supported_features().bits(),
                connection.pending_messages(),
                self.policy_or_unknown(address),
            ));
        }
        out
    }

    fn running_lookup(&self, address: PeerAddress) -> Result<PeerConnection, ServiceError> {
        if !self.is_running() {
            return Err(ServiceError::NotRunning);
        }
        self.registry
            .lookup(&address)
            .ok_or(ServiceError::UnknownPeer(address))
    }

    fn policy_or_unknown(&self, address: PeerAddress) -> ConnectionPolicy {
        self.policies.get(&address).unwrap_or_else(|err| {
            warn!(%address, %err, "Failed to read connection policy");
            ConnectionPolicy::Unknown
        })
    }
}

impl MapClient for MapClientService {
    fn connect(&self, address: PeerAddress) -> bool {
        self.try_connect(address).is_ok()
    }

    fn disconnect(&self, address: PeerAddress) -> bool {
        self.try_disconnect(address).is_ok()
    }

    fn connection_state(&self, address: PeerAddress) -> ConnectionState {
        if !self.is_running() {
            return ConnectionState::Disconnected;
        }
        self.registry
            .lookup(&address)
            .map(|connection| connection.state())
            .unwrap_or_default()
    }

    fn connected_devices(&self) -> Vec<PeerAddress> {
        self.devices_matching_states(&[ConnectionState::Connected])
    }

    fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<PeerAddress> {
        if !self.is_running() {
            return Vec::new();
        }
        self.registry.keys_matching(states)
    }

    fn set_connection_policy(&self, address: PeerAddress, policy: ConnectionPolicy) -> bool {
        if !self.is_running() {
            return false;
        }
        let stored = match policy {
            ConnectionPolicy::Unknown => self.policies.remove(&address),
            ConnectionPolicy::Allowed | ConnectionPolicy::Forbidden => {
                self.policies.set(address, policy)
            }
        };
        if let Err(err) = stored {
            warn!(%address, %policy, %err, "Failed to store connection policy");
            return false;
        }
        debug!(%address, %policy, "Connection policy updated");

        let converged = match policy {
            ConnectionPolicy::Allowed => self.try_connect(address),
            ConnectionPolicy::Forbidden => self.try_disconnect(address),
            ConnectionPolicy::Unknown => Ok(()),
        };
        if let Err(err) = converged {
            debug!(%address, %policy, %err, "Policy stored without state change");
        }
        true
    }

    fn connection_policy(&self, address: PeerAddress) -> ConnectionPolicy {
        self.policy_or_unknown(address)
    }

    fn send_message(&self, address: PeerAddress, message: OutboundMessage) -> bool {
        self.try_send_message(address, message).is_ok()
    }

    fn supported_features(&self, address: PeerAddress) -> SupportedFeatures {
        if !self.is_running() {
            return SupportedFeatures::empty();
        }
        self.registry
            .lookup(&address)
            .map(|connection| connection.supported_features())
            .unwrap_or_default()
    }
}

impl Drop for MapClientService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MapClientService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapClientService")
            .field("config", &self.config)
            .field("entries", &self.registry.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Removes entries as soon as their connection settles in `Disconnected`.
async fn reclaim_disconnected(
    registry: Arc<PeerRegistry>,
    mut events: broadcast::Receiver<ConnectionEvent>,
) {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::StateChanged {
                address,
                new_state: ConnectionState::Disconnected,
                ..
            }) => {
                let idle = PeerConnection::shutdown_if_idle;
                if registry.remove_if(&address, idle).is_some() {
                    debug!(%address, "Reclaimed disconnected entry");
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                let swept = registry.evict_stale();
                warn!(skipped, swept, "Reclaimer lagged, swept stale entries");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
