//! Loopback simulation of the platform stack.
//!
//! Discovery results and link events travel through the same router
//! channel a real platform adapter would use.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use mapc_connection::{DiscoveryError, MessageTransport, ServiceDiscovery, TransportError};
use mapc_primitives::{
    ConnectionPolicy, ConnectionState, MessageTypes, OutboundMessage, PeerAddress, ServiceRecord,
    SupportedFeatures,
};
use mapc_service::{
    FilePolicyStore, MapClient, MapClientService, MemoryPolicyStore, PlatformEvent, PolicyStore,
    ServiceConfig,
};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, info, warn};

use crate::{cli::SimulateArgs, config::DaemonConfig};

/// Delay before a simulated SDP search completes.
const DISCOVERY_DELAY: Duration = Duration::from_millis(20);

/// Delay of a simulated transport round trip.
const TRANSPORT_DELAY: Duration = Duration::from_millis(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Answers every search after a short delay; every `fail_every`-th peer has
/// no message access record.
struct LoopbackDiscovery {
    events: mpsc::Sender<PlatformEvent>,
    fail_every: u8,
}

impl LoopbackDiscovery {
    fn outcome(&self, address: PeerAddress) -> Result<ServiceRecord, DiscoveryError> {
        let index = address.octets()[5];
        if self.fail_every > 0 && index % self.fail_every == 0 {
            return Err(DiscoveryError::NoRecord);
        }
        Ok(ServiceRecord {
            instance_id: 0,
            name: "SMS/MMS".to_string(),
            profile_version: 0x0104,
            message_types: MessageTypes::SMS_GSM | MessageTypes::SMS_CDMA | MessageTypes::MMS,
            supported_features: SupportedFeatures::NOTIFICATION_REGISTRATION
                | SupportedFeatures::NOTIFICATION
                | SupportedFeatures::BROWSING
                | SupportedFeatures::UPLOADING
                | SupportedFeatures::EXTENDED_EVENT_REPORT_1_1,
        })
    }
}

impl ServiceDiscovery for LoopbackDiscovery {
    fn start_discovery(&self, address: PeerAddress) {
        let events = self.events.clone();
        let outcome = self.outcome(address);
        tokio::spawn(async move {
            tokio::time::sleep(DISCOVERY_DELAY).await;
            let discovered = PlatformEvent::ServiceDiscovered { address, outcome };
            if events.send(discovered).await.is_err() {
                debug!(%address, "Router gone, discovery result dropped");
            }
        });
    }
}

/// Transport that accepts everything and counts transmitted messages.
#[derive(Debug, Default)]
struct LoopbackTransport {
    sent: AtomicUsize,
}

impl LoopbackTransport {
    fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageTransport for LoopbackTransport {
    async fn connect(
        &self,
        address: PeerAddress,
        record: &ServiceRecord,
    ) -> Result<(), TransportError> {
        tokio::time::sleep(TRANSPORT_DELAY).await;
        debug!(%address, instance = record.instance_id, "Loopback session open");
        Ok(())
    }

    async fn disconnect(&self, address: PeerAddress) -> Result<(), TransportError> {
        debug!(%address, "Loopback session closed");
        Ok(())
    }

    async fn send_message(
        &self,
        address: PeerAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        tokio::time::sleep(TRANSPORT_DELAY).await;
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(%address, body_len = message.body.len(), "Loopback message pushed");
        Ok(())
    }
}

/// Outcome of a simulation run.
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) accepted: usize,
    pub(crate) rejected: usize,
    pub(crate) connected: usize,
    pub(crate) messages_sent: usize,
    pub(crate) final_connected: Vec<PeerAddress>,
    pub(crate) dump: String,
}

/// `mapcd simulate`.
pub(crate) async fn run(args: SimulateArgs) -> Result<()> {
    let config = DaemonConfig::from_args(&args.config)?;
    let report = simulate(&config.service, &args).await?;

    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        connected = report.connected,
        messages_sent = report.messages_sent,
        "Simulation finished"
    );
    print!("{}", report.dump);
    Ok(())
}

pub(crate) async fn simulate(config: &ServiceConfig, args: &SimulateArgs) -> Result<Report> {
    let policies: Arc<dyn PolicyStore> = match &config.policy_file {
        Some(path) => {
            let store = FilePolicyStore::open_with_create_dir(path)
                .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
            Arc::new(store)
        }
        None => Arc::new(MemoryPolicyStore::new()),
    };

    let (events_tx, events_rx) = mpsc::channel(64);
    let discovery = Arc::new(LoopbackDiscovery {
        events: events_tx.clone(),
        fail_every: args.fail_every,
    });
    let transport = Arc::new(LoopbackTransport::default());
    let service = MapClientService::new(config.clone(), discovery, transport.clone(), policies);
    service.start(Handle::current());
    service.attach_platform_events(events_rx)?;

    let settle = Duration::from_millis(config.connect_timeout_ms) + Duration::from_secs(1);
    let peers: Vec<PeerAddress> = (1..=args.peers).map(peer_address).collect();

    let mut accepted = 0;
    for &peer in &peers {
        if service.connect(peer) {
            accepted += 1;
        } else {
            warn!(%peer, "Connect rejected");
        }
    }
    wait_settled(&service, settle).await;

    let mut connected = service.connected_devices();
    connected.sort();
    info!(count = connected.len(), "Peers connected");

    let mut queued = 0;
    for &peer in &connected {
        for n in 0..args.messages {
            let message = OutboundMessage::new([format!("+1555010{n:04}")], format!("ping {n}"));
            if service.send_message(peer, message) {
                queued += 1;
            }
        }
    }
    poll_until(settle, || transport.sent() >= queued).await;

    // Forbid the last connected peer and drop the link of the first.
    if let Some(&peer) = connected.last() {
        service.set_connection_policy(peer, ConnectionPolicy::Forbidden);
    }
    if let Some(&peer) = connected.first() {
        events_tx
            .send(PlatformEvent::LinkDisconnected(peer))
            .await
            .wrap_err("Router channel closed")?;
        let dropped = || service.connection_state(peer) == ConnectionState::Disconnected;
        poll_until(settle, dropped).await;
    }
    wait_settled(&service, settle).await;

    let mut final_connected = service.connected_devices();
    final_connected.sort();
    let report = Report {
        accepted,
        rejected: peers.len() - accepted,
        connected: connected.len(),
        messages_sent: transport.sent(),
        final_connected,
        dump: service.dump(),
    };
    service.stop();
    Ok(report)
}

fn peer_address(index: u8) -> PeerAddress {
    PeerAddress::new([0x02, 0x00, 0x5e, 0x10, 0x00, index])
}

/// Waits until no peer is mid-transition.
async fn wait_settled(service: &MapClientService, within: Duration) {
    let transitional = [ConnectionState::Connecting, ConnectionState::Disconnecting];
    let settled = || service.devices_matching_states(&transitional).is_empty();
    poll_until(within, settled).await;
}

async fn poll_until(within: Duration, mut condition: impl FnMut() -> bool) {
    let settled = tokio::time::timeout(within, async {
        while !condition() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;
    if settled.is_err() {
        warn!(?within, "Simulation did not settle in time");
    }
}
