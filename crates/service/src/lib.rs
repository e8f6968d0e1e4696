//! MAP client service: the caller-facing facade over a bounded registry of
//! per-peer connection state machines, plus the router that feeds platform
//! notifications into them.

mod api;
mod config;
mod error;
mod metrics;
mod policy;
mod router;
mod service;

pub use api::MapClient;
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use policy::{FilePolicyStore, MemoryPolicyStore, PolicyStore, PolicyStoreError};
pub use router::{EventRouter, PlatformEvent, RouteOutcome};
pub use service::{MapClientService, PeerRegistry};
