use metrics::{Counter, counter};

/// Counters shared by every connection actor.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionMetrics {
    attempts_total: Counter,
    attempts_failed_total: Counter,
    connect_timeouts_total: Counter,
    messages_sent_total: Counter,
    messages_failed_total: Counter,
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self {
            attempts_total: counter!("mapc.connection.attempts_total"),
            attempts_failed_total: counter!("mapc.connection.attempts_failed_total"),
            connect_timeouts_total: counter!("mapc.connection.connect_timeouts_total"),
            messages_sent_total: counter!("mapc.connection.messages_sent_total"),
            messages_failed_total: counter!("mapc.connection.messages_failed_total"),
        }
    }
}

impl ConnectionMetrics {
    pub(crate) fn inc_attempts(&self) {
        self.attempts_total.increment(1);
    }

    pub(crate) fn inc_attempts_failed(&self) {
        self.attempts_failed_total.increment(1);
    }

    pub(crate) fn inc_connect_timeouts(&self) {
        self.connect_timeouts_total.increment(1);
    }

    pub(crate) fn inc_messages_sent(&self) {
        self.messages_sent_total.increment(1);
    }

    pub(crate) fn inc_messages_failed(&self) {
        self.messages_failed_total.increment(1);
    }
}
