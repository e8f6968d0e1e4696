//! Connection policy persistence (memory, file).

mod file;
mod memory;

use auto_impl::auto_impl;
use mapc_primitives::{ConnectionPolicy, PeerAddress};
use thiserror::Error;

pub use file::FilePolicyStore;
pub use memory::MemoryPolicyStore;

#[derive(Debug, Error)]
pub enum PolicyStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Per-peer policy persistence. Peers without a stored policy read as
/// [`ConnectionPolicy::Unknown`].
#[auto_impl(&, Box, Arc)]
pub trait PolicyStore: Send + Sync {
    fn get(&self, address: &PeerAddress) -> Result<ConnectionPolicy, PolicyStoreError>;

    fn set(&self, address: PeerAddress, policy: ConnectionPolicy) -> Result<(), PolicyStoreError>;

    fn remove(&self, address: &PeerAddress) -> Result<(), PolicyStoreError>;
}
