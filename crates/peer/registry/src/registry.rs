//! Capacity-bounded map from peer key to connection entry.
//!
//! All mutations and bulk reads go through a single mutex held only for the
//! map operation itself. Stale entries are claimed under that lock; the rest
//! of their teardown runs after it is released, so entry teardown can never
//! re-enter the registry.

use std::collections::BTreeMap;
use std::fmt::Debug;

use mapc_primitives::ConnectionState;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::metrics::RegistryMetrics;

/// Blanket-implemented for any ordered, shareable key.
pub trait RegistryKey: Clone + Ord + Debug + Send + Sync + 'static {}

impl<T> RegistryKey for T where T: Clone + Ord + Debug + Send + Sync + 'static {}

/// An entry the registry can inspect and retire.
pub trait RegistryEntry: Clone + Send + Sync + 'static {
    fn connection_state(&self) -> ConnectionState;

    /// Atomically claims the entry for eviction if it is stale. Runs under
    /// the registry lock; an entry that returns `true` must refuse any
    /// further work.
    fn retire_if_stale(&self) -> bool {
        self.connection_state().is_stale()
    }

    /// Called once the entry has left the registry.
    fn retire(&self) {}
}

/// Outcome of [`ConnectionRegistry::get_or_create`].
#[derive(Debug, Clone)]
pub enum Admission<E> {
    Existing(E),
    Created(E),
    /// At capacity with nothing evictable.
    Rejected,
}

impl<E> Admission<E> {
    pub fn into_entry(self) -> Option<E> {
        match self {
            Self::Existing(entry) | Self::Created(entry) => Some(entry),
            Self::Rejected => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Owns at most `capacity` entries, one per key.
#[derive(Debug)]
pub struct ConnectionRegistry<K: RegistryKey, E: RegistryEntry> {
    capacity: usize,
    entries: Mutex<BTreeMap<K, E>>,
    metrics: RegistryMetrics,
}

impl<K: RegistryKey, E: RegistryEntry> ConnectionRegistry<K, E> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(BTreeMap::new()),
            metrics: RegistryMetrics::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the entry for `key`, creating it with `make` when there is room.
    ///
    /// At capacity, every `Disconnected` entry is swept first and the
    /// insertion retried once. Entries in any other state are never evicted.
    pub fn get_or_create(&self, key: K, make: impl FnOnce(&K) -> E) -> Admission<E> {
        let (admission, evicted) = {
            let mut entries = self.entries.lock();

            if let Some(entry) = entries.get(&key) {
                return Admission::Existing(entry.clone());
            }

            let evicted = if entries.len() >= self.capacity {
                Self::sweep(&mut entries)
            } else {
                Vec::new()
            };

            let admission = if entries.len() < self.capacity {
                let entry = make(&key);
                entries.insert(key.clone(), entry.clone());
                debug!(?key, len = entries.len(), "registry entry created");
                Admission::Created(entry)
            } else {
                Admission::Rejected
            };

            self.metrics.set_entries(entries.len());
            (admission, evicted)
        };

        if matches!(admission, Admission::Rejected) {
            warn!(?key, capacity = self.capacity, "registry at capacity, rejecting");
            self.metrics.inc_rejected();
        }
        self.retire_all(evicted);

        admission
    }

    /// Remove every `Disconnected` entry. Returns how many were removed.
    pub fn evict_stale(&self) -> usize {
        let evicted = {
            let mut entries = self.entries.lock();
            let evicted = Self::sweep(&mut entries);
            self.metrics.set_entries(entries.len());
            evicted
        };
        let count = evicted.len();
        self.retire_all(evicted);
        count
    }

    pub fn lookup(&self, key: &K) -> Option<E> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Remove and retire the entry for `key`.
    pub fn remove(&self, key: &K) -> Option<E> {
        self.remove_if(key, |_| true)
    }

    /// Remove and retire the entry for `key` only if `predicate` holds,
    /// evaluated under the registry lock.
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&E) -> bool) -> Option<E> {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = match entries.get(key) {
                Some(entry) if predicate(entry) => entries.remove(key),
                _ => None,
            };
            self.metrics.set_entries(entries.len());
            removed
        };

        if let Some(entry) = &removed {
            debug!(?key, "registry entry removed");
            entry.retire();
        }
        removed
    }

    /// Keys whose entry is in one of `states`, in key order.
    pub fn keys_matching(&self, states: &[ConnectionState]) -> Vec<K> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| states.contains(&entry.connection_state()))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Point-in-time view of every entry's state.
    pub fn snapshot(&self) -> Vec<(K, ConnectionState)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.connection_state()))
            .collect()
    }

    pub fn entries(&self) -> Vec<(K, E)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Remove and retire everything.
    pub fn drain(&self) -> usize {
        let drained = {
            let mut entries = self.entries.lock();
            let drained = std::mem::take(&mut *entries);
            self.metrics.set_entries(0);
            drained
        };
        let count = drained.len();
        for entry in drained.into_values() {
            entry.retire();
        }
        count
    }

    fn sweep(entries: &mut BTreeMap<K, E>) -> Vec<E> {
        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.retire_if_stale())
            .map(|(key, _)| key.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|key| {
                trace!(?key, "evicting stale entry");
                entries.remove(&key)
            })
            .collect()
    }

    fn retire_all(&self, evicted: Vec<E>) {
        if evicted.is_empty() {
            return;
        }
        debug!(count = evicted.len(), "evicted stale entries");
        self.metrics.inc_evicted(evicted.len());
        for entry in evicted {
            entry.retire();
        }
    }
}
