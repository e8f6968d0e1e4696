//! Actor task driving one peer's connection.

use std::sync::Arc;

use mapc_primitives::{ConnectionState, ServiceRecord};
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, info, trace, warn};

use crate::{
    config::ConnectionConfig,
    error::DiscoveryError,
    machine::{FollowUp, Shared},
    metrics::ConnectionMetrics,
    traits::{MessageTransport, ServiceDiscovery},
};

/// Work items accepted by a handle and processed by the actor in order.
#[derive(Debug)]
pub(crate) enum Input {
    /// Start the attempt with the given generation.
    Connect { generation: u64 },
    /// Tear down the session established under the given generation.
    Disconnect { generation: u64 },
    ServiceDiscovered(Result<ServiceRecord, DiscoveryError>),
    LinkLost,
    /// Transmit queued messages.
    Flush,
}

pub(crate) struct ConnectionActor {
    shared: Arc<Shared>,
    inbox: mpsc::Receiver<Input>,
    shutdown: watch::Receiver<bool>,
    discovery: Arc<dyn ServiceDiscovery>,
    transport: Arc<dyn MessageTransport>,
    config: ConnectionConfig,
    metrics: ConnectionMetrics,
    /// Whether the transport holds a session for this peer.
    link_up: bool,
    /// Connect deadline and the attempt it belongs to.
    deadline: Option<(Instant, u64)>,
    /// Attempt whose service search is outstanding.
    searching: Option<u64>,
}

impl ConnectionActor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        inbox: mpsc::Receiver<Input>,
        shutdown: watch::Receiver<bool>,
        discovery: Arc<dyn ServiceDiscovery>,
        transport: Arc<dyn MessageTransport>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            shared,
            inbox,
            shutdown,
            discovery,
            transport,
            config,
            metrics: ConnectionMetrics::default(),
            link_up: false,
            deadline: None,
            searching: None,
        }
    }

    pub(crate) async fn run(mut self) {
        trace!("Connection actor started");
        loop {
            let deadline = self.deadline.map(|(at, _)| at);
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => break,
                _ = wait_deadline(deadline) => self.on_connect_timeout(),
                input = self.inbox.recv() => match input {
                    Some(input) => self.handle(input).await,
                    None => break,
                },
            }
        }
        self.release_link().await;
        trace!("Connection actor stopped");
    }

    async fn handle(&mut self, input: Input) {
        trace!(?input, "Processing input");
        match input {
            Input::Connect { generation } => self.on_connect(generation),
            Input::Disconnect { generation } => self.on_disconnect(generation).await,
            Input::ServiceDiscovered(outcome) => self.on_service_discovered(outcome).await,
            Input::LinkLost => self.on_link_lost().await,
            Input::Flush => self.flush().await,
        }
    }

    fn on_connect(&mut self, generation: u64) {
        let current = {
            let machine = self.shared.lock();
            machine.state == ConnectionState::Connecting && machine.generation == generation
        };
        if current {
            self.begin_discovery(generation);
        } else {
            trace!(generation, "Stale connect request");
        }
    }

    fn begin_discovery(&mut self, generation: u64) {
        self.metrics.inc_attempts();
        self.deadline = Some((Instant::now() + self.config.connect_timeout, generation));
        self.searching = Some(generation);
        debug!(generation, "Starting service discovery");
        self.discovery.start_discovery(self.shared.address);
    }

    async fn on_service_discovered(&mut self, outcome: Result<ServiceRecord, DiscoveryError>) {
        // Results carry no attempt tag; only the search started for the
        // current attempt can complete it.
        let generation = {
            let machine = self.shared.lock();
            if machine.state != ConnectionState::Connecting
                || self.searching != Some(machine.generation)
            {
                debug!(state = %machine.state, "Ignoring discovery result");
                return;
            }
            machine.generation
        };
        self.searching = None;

        let record = match outcome {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "Service discovery failed");
                self.fail_attempt(generation);
                return;
            }
        };

        let remaining = self
            .deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
            .unwrap_or(self.config.connect_timeout);
        let connect = self.transport.connect(self.shared.address, &record);
        match timeout(remaining, connect).await {
            Ok(Ok(())) => {
                self.link_up = true;
                self.on_link_up(generation, record).await;
            }
            Ok(Err(err)) => {
                warn!(%err, "Transport connect failed");
                self.fail_attempt(generation);
            }
            Err(_) => {
                warn!(?remaining, "Transport connect timed out");
                self.metrics.inc_connect_timeouts();
                self.fail_attempt(generation);
            }
        }
    }

    async fn on_link_up(&mut self, generation: u64, record: ServiceRecord) {
        let disconnect_now = {
            let mut machine = self.shared.lock();
            if machine.generation != generation || machine.state != ConnectionState::Connecting {
                None
            } else {
                machine.features = record.supported_features;
                self.shared
                    .transition(&mut machine, ConnectionState::Connected);
                self.shared
                    .events()
                    .features_resolved(self.shared.address, record.supported_features);
                let disconnect = machine.follow_up.take() == Some(FollowUp::Disconnect);
                if disconnect {
                    self.shared
                        .transition(&mut machine, ConnectionState::Disconnecting);
                }
                Some(disconnect)
            }
        };
        self.deadline = None;

        match disconnect_now {
            None => {
                debug!(generation, "Attempt superseded, releasing session");
                self.release_link().await;
            }
            Some(true) => {
                info!(
                    instance = record.instance_id,
                    "Connected, disconnect requested meanwhile"
                );
                self.teardown(generation).await;
            }
            Some(false) => {
                info!(instance = record.instance_id, name = %record.name, "Connected");
                self.flush().await;
            }
        }
    }

    fn fail_attempt(&mut self, generation: u64) {
        if self.deadline.is_some_and(|(_, armed)| armed == generation) {
            self.deadline = None;
        }
        let mut machine = self.shared.lock();
        if machine.generation == generation && machine.state == ConnectionState::Connecting {
            self.metrics.inc_attempts_failed();
            machine.follow_up = None;
            self.shared
                .transition(&mut machine, ConnectionState::Disconnected);
        }
    }

    fn on_connect_timeout(&mut self) {
        if let Some((_, generation)) = self.deadline.take() {
            warn!(timeout = ?self.config.connect_timeout, "Connect attempt timed out");
            self.metrics.inc_connect_timeouts();
            self.fail_attempt(generation);
        }
    }

    async fn on_disconnect(&mut self, generation: u64) {
        let current = {
            let machine = self.shared.lock();
            machine.state == ConnectionState::Disconnecting && machine.generation == generation
        };
        if current {
            self.teardown(generation).await;
        } else {
            trace!(generation, "Stale disconnect request");
        }
    }

    async fn on_link_lost(&mut self) {
        let (state, generation) = {
            let mut machine = self.shared.lock();
            let state = machine.state;
            if state == ConnectionState::Connected {
                self.shared
                    .transition(&mut machine, ConnectionState::Disconnecting);
            }
            (state, machine.generation)
        };
        match state {
            ConnectionState::Connected | ConnectionState::Disconnecting => {
                info!("Link lost");
                self.teardown(generation).await;
            }
            ConnectionState::Connecting => {
                info!("Link lost while connecting");
                self.fail_attempt(generation);
            }
            ConnectionState::Disconnected => trace!("Link lost while disconnected"),
        }
    }

    /// Releases the session and settles the machine in `Disconnected`,
    /// restarting if a connect arrived during teardown.
    async fn teardown(&mut self, generation: u64) {
        self.release_link().await;

        let restart = {
            let mut machine = self.shared.lock();
            if machine.generation != generation || machine.state != ConnectionState::Disconnecting {
                return;
            }
            self.shared
                .transition(&mut machine, ConnectionState::Disconnected);
            if machine.follow_up.take() == Some(FollowUp::Connect) {
                machine.generation += 1;
                self.shared
                    .transition(&mut machine, ConnectionState::Connecting);
                Some(machine.generation)
            } else {
                None
            }
        };
        if let Some(generation) = restart {
            debug!(generation, "Reconnecting after teardown");
            self.begin_discovery(generation);
        }
    }

    async fn release_link(&mut self) {
        if !self.link_up {
            return;
        }
        self.link_up = false;
        let disconnect = self.transport.disconnect(self.shared.address);
        match timeout(self.config.disconnect_timeout, disconnect).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "Transport disconnect failed"),
            Err(_) => warn!("Transport disconnect timed out"),
        }
    }

    /// Sends queued messages in FIFO order while the machine stays connected.
    async fn flush(&mut self) {
        loop {
            let message = {
                let mut machine = self.shared.lock();
                if !machine.state.is_connected() {
                    return;
                }
                match machine.pending.pop_front() {
                    Some(message) => message,
                    None => return,
                }
            };
            let address = self.shared.address;
            match self.transport.send_message(address, &message).await {
                Ok(()) => {
                    self.metrics.inc_messages_sent();
                    self.shared.events().message_sent(address);
                }
                Err(err) => {
                    warn!(%err, recipients = message.recipients.len(), "Message send failed");
                    self.metrics.inc_messages_failed();
                    let reason = err.to_string();
                    self.shared.events().message_failed(address, reason);
                }
            }
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
