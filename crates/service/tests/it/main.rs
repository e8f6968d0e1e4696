mod lifecycle;
mod properties;
mod router;

use std::{sync::Arc, time::Duration};

use mapc_connection::mock::{MockTransport, RecordingDiscovery, wait_until};
use mapc_primitives::{ConnectionPolicy, ConnectionState, PeerAddress, ServiceRecord};
use mapc_service::{
    EventRouter, MapClient, MapClientService, MemoryPolicyStore, PlatformEvent, ServiceConfig,
};
use tokio::runtime::Handle;

pub(crate) const WAIT: Duration = Duration::from_secs(2);

pub(crate) struct TestService {
    pub(crate) service: MapClientService,
    pub(crate) router: EventRouter,
    pub(crate) discovery: Arc<RecordingDiscovery>,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) policies: Arc<MemoryPolicyStore>,
}

impl TestService {
    pub(crate) fn start(config: ServiceConfig) -> Self {
        let discovery = Arc::new(RecordingDiscovery::default());
        let transport = Arc::new(MockTransport::default());
        let policies = Arc::new(MemoryPolicyStore::new());
        let service = MapClientService::new(
            config,
            discovery.clone(),
            transport.clone(),
            policies.clone(),
        );
        service.start(Handle::current());
        let router = service.router();
        Self {
            service,
            router,
            discovery,
            transport,
            policies,
        }
    }

    pub(crate) fn discovered(&self, address: PeerAddress) {
        self.router.route(PlatformEvent::ServiceDiscovered {
            address,
            outcome: Ok(ServiceRecord::with_feature_bits(1, 0x0000_0603)),
        });
    }

    pub(crate) fn state(&self, address: PeerAddress) -> ConnectionState {
        self.service.connection_state(address)
    }

    pub(crate) fn set_policy(&self, address: PeerAddress, policy: ConnectionPolicy) -> bool {
        self.service.set_connection_policy(address, policy)
    }

    /// Service searches started for `address`.
    pub(crate) fn searches(&self, address: PeerAddress) -> usize {
        self.discovery.request_count(address)
    }

    pub(crate) async fn wait_for(&self, address: PeerAddress, state: ConnectionState) -> bool {
        wait_until(WAIT, || self.state(address) == state).await
    }

    /// Connects `address` all the way to `Connected`.
    pub(crate) async fn connected(&self, address: PeerAddress) {
        assert!(self.service.connect(address));
        self.discovered(address);
        assert!(self.wait_for(address, ConnectionState::Connected).await);
    }
}

pub(crate) fn address(n: u8) -> PeerAddress {
    PeerAddress::new([0x48, 0x2c, 0xa0, 0x00, 0x00, n])
}
