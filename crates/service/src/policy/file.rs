//! JSON file-based policy store with atomic writes.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use mapc_primitives::{ConnectionPolicy, PeerAddress};
use parking_lot::RwLock;
use tracing::debug;

use super::{PolicyStore, PolicyStoreError};

/// JSON object keyed by peer address. Loaded on open, rewritten on every
/// change.
#[derive(Debug)]
pub struct FilePolicyStore {
    path: PathBuf,
    policies: RwLock<BTreeMap<PeerAddress, ConnectionPolicy>>,
}

impl FilePolicyStore {
    /// Load existing file or start empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PolicyStoreError> {
        let path = path.into();
        let policies = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), count = policies.len(), "Opened policy store");

        Ok(Self {
            path,
            policies: RwLock::new(policies),
        })
    }

    /// Open store, making parent directories if needed.
    pub fn open_with_create_dir(path: impl Into<PathBuf>) -> Result<Self, PolicyStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(
        path: &Path,
    ) -> Result<BTreeMap<PeerAddress, ConnectionPolicy>, PolicyStoreError> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|e| PolicyStoreError::Serialization(e.to_string()))
    }

    fn save_to_file(
        &self,
        policies: &BTreeMap<PeerAddress, ConnectionPolicy>,
    ) -> Result<(), PolicyStoreError> {
        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(writer, policies)
                .map_err(|e| PolicyStoreError::Serialization(e.to_string()))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Applies `change` and persists; the in-memory map is only updated if
    /// the write succeeds.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<PeerAddress, ConnectionPolicy>),
    ) -> Result<(), PolicyStoreError> {
        let mut policies = self.policies.write();
        let mut next = policies.clone();
        change(&mut next);
        self.save_to_file(&next)?;
        *policies = next;
        Ok(())
    }
}

impl PolicyStore for FilePolicyStore {
    fn get(&self, address: &PeerAddress) -> Result<ConnectionPolicy, PolicyStoreError> {
        let policies = self.policies.read();
        Ok(policies.get(address).copied().unwrap_or_default())
    }

    fn set(&self, address: PeerAddress, policy: ConnectionPolicy) -> Result<(), PolicyStoreError> {
        self.update(|policies| {
            policies.insert(address, policy);
        })
    }

    fn remove(&self, address: &PeerAddress) -> Result<(), PolicyStoreError> {
        if !self.policies.read().contains_key(address) {
            return Ok(());
        }
        self.update(|policies| {
            policies.remove(address);
        })
    }
}
