use metrics::{Counter, counter};

#[derive(Debug, Clone)]
pub(crate) struct ServiceMetrics {
    connect_accepted_total: Counter,
    policy_rejected_total: Counter,
    capacity_rejected_total: Counter,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self {
            connect_accepted_total: counter!("mapc.service.connect_accepted_total"),
            policy_rejected_total: counter!("mapc.service.policy_rejected_total"),
            capacity_rejected_total: counter!("mapc.service.capacity_rejected_total"),
        }
    }
}

impl ServiceMetrics {
    pub(crate) fn inc_connect_accepted(&self) {
        self.connect_accepted_total.increment(1);
    }

    pub(crate) fn inc_policy_rejected(&self) {
        self.policy_rejected_total.increment(1);
    }

    pub(crate) fn inc_capacity_rejected(&self) {
        self.capacity_rejected_total.increment(1);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RouterMetrics {
    unknown_peer_total: Counter,
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self {
            unknown_peer_total: counter!("mapc.router.unknown_peer_total"),
        }
    }
}

impl RouterMetrics {
    pub(crate) fn inc_unknown_peer(&self) {
        self.unknown_peer_total.increment(1);
    }
}
