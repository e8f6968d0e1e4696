//! Core value types shared by every MAP client crate.

mod address;
mod features;
mod message;
mod policy;
mod state;

pub use address::{AddressParseError, PeerAddress};
pub use features::{MessageTypes, ServiceRecord, SupportedFeatures};
pub use message::OutboundMessage;
pub use policy::ConnectionPolicy;
pub use state::ConnectionState;
