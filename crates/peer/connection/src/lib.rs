//! Per-peer connection state machine.
//!
//! Every remote device gets a [`PeerConnection`] handle backed by its own
//! actor task. Handles answer accept/reject synchronously against the
//! shared machine state; discovery, lower-layer connects, teardown and
//! message transmission run on the actor, one input at a time, so a single
//! peer's events are always processed in the order they were delivered.

mod actor;
mod config;
mod connection;
mod error;
mod events;
mod machine;
mod metrics;
mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::ConnectionConfig;
pub use connection::{ConnectionContext, PeerConnection};
pub use error::{CommandError, DiscoveryError, TransportError};
pub use events::{ConnectionEvent, EventEmitter};
pub use traits::{MessageTransport, ServiceDiscovery};
