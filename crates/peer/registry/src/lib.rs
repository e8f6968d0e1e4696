//! Bounded registry owning one connection entry per peer.

mod metrics;
mod registry;

pub use registry::{Admission, ConnectionRegistry, RegistryEntry, RegistryKey};
