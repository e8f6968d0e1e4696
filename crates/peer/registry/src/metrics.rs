//! Registry metrics

use metrics::{Counter, Gauge};

#[derive(Clone, Debug)]
pub(crate) struct RegistryMetrics {
    /// Number of entries currently held
    entries: Gauge,
    /// Entries removed by stale sweeps
    evicted_total: Counter,
    /// Insertions refused at capacity
    rejected_total: Counter,
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self {
            entries: metrics::gauge!("mapc.registry.entries"),
            evicted_total: metrics::counter!("mapc.registry.evicted_total"),
            rejected_total: metrics::counter!("mapc.registry.rejected_total"),
        }
    }
}

impl RegistryMetrics {
    pub(crate) fn set_entries(&self, len: usize) {
        self.entries.set(len as f64);
    }

    pub(crate) fn inc_evicted(&self, count: usize) {
        self.evicted_total.increment(count as u64);
    }

    pub(crate) fn inc_rejected(&self) {
        self.rejected_total.increment(1);
    }
}
