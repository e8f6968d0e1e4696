//! In-memory policy store (does not persist across restarts).

use std::collections::HashMap;

use mapc_primitives::{ConnectionPolicy, PeerAddress};
use parking_lot::RwLock;

use super::{PolicyStore, PolicyStoreError};

#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<HashMap<PeerAddress, ConnectionPolicy>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn get(&self, address: &PeerAddress) -> Result<ConnectionPolicy, PolicyStoreError> {
        let policies = self.policies.read();
        Ok(policies.get(address).copied().unwrap_or_default())
    }

    fn set(&self, address: PeerAddress, policy: ConnectionPolicy) -> Result<(), PolicyStoreError> {
        self.policies.write().insert(address, policy);
        Ok(())
    }

    fn remove(&self, address: &PeerAddress) -> Result<(), PolicyStoreError> {
        self.policies.write().remove(address);
        Ok(())
    }
}
