//! In-memory collaborators for tests and simulations.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use mapc_primitives::{OutboundMessage, PeerAddress, ServiceRecord};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    error::TransportError,
    traits::{MessageTransport, ServiceDiscovery},
};

/// Discovery that only records which peers were searched.
#[derive(Debug, Default)]
pub struct RecordingDiscovery {
    requests: Mutex<Vec<PeerAddress>>,
}

impl RecordingDiscovery {
    pub fn request_count(&self, address: PeerAddress) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|a| **a == address)
            .count()
    }
}

impl ServiceDiscovery for RecordingDiscovery {
    fn start_discovery(&self, address: PeerAddress) {
        self.requests.lock().push(address);
    }
}

#[derive(Debug, Default)]
struct TransportState {
    connect_delay: Duration,
    disconnect_delay: Duration,
    failing_connects: HashSet<PeerAddress>,
    fail_sends: bool,
    connect_attempts: usize,
    connects: Vec<PeerAddress>,
    disconnects: Vec<PeerAddress>,
    sent: Vec<(PeerAddress, OutboundMessage)>,
}

/// Transport that records every call and fails on request.
#[derive(Debug)]
pub struct MockTransport {
    state: Mutex<TransportState>,
    /// Connects wait until this reads `true`.
    connect_gate: watch::Sender<bool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            connect_gate: watch::Sender::new(true),
        }
    }
}

impl MockTransport {
    /// Delay applied to every connect before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().connect_delay = delay;
    }

    /// Delay applied to every disconnect after it is recorded.
    pub fn set_disconnect_delay(&self, delay: Duration) {
        self.state.lock().disconnect_delay = delay;
    }

    /// Parks every connect until [`release_connects`](Self::release_connects).
    pub fn hold_connects(&self) {
        self.connect_gate.send_replace(false);
    }

    pub fn release_connects(&self) {
        self.connect_gate.send_replace(true);
    }

    pub fn fail_connects_for(&self, address: PeerAddress) {
        self.state.lock().failing_connects.insert(address);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Connects entered, including ones still parked or delayed.
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    /// Connects that resolved.
    pub fn connects(&self) -> Vec<PeerAddress> {
        self.state.lock().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<PeerAddress> {
        self.state.lock().disconnects.clone()
    }

    pub fn sent(&self) -> Vec<(PeerAddress, OutboundMessage)> {
        self.state.lock().sent.clone()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn connect(
        &self,
        address: PeerAddress,
        _record: &ServiceRecord,
    ) -> Result<(), TransportError> {
        let (delay, fail) = {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            (
                state.connect_delay,
                state.failing_connects.contains(&address),
            )
        };

        let mut gate = self.connect_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(TransportError::Connect("transport closed".to_string()));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.state.lock().connects.push(address);
        if fail {
            Err(TransportError::Connect("refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&self, address: PeerAddress) -> Result<(), TransportError> {
        let delay = {
            let mut state = self.state.lock();
            state.disconnects.push(address);
            state.disconnect_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn send_message(
        &self,
        address: PeerAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(TransportError::Send("rejected by server".to_string()));
        }
        state.sent.push((address, message.clone()));
        Ok(())
    }
}

/// Polls `condition` until it holds or `within` elapses.
pub async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(within, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
