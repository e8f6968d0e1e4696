use mapc_connection::CommandError;
use mapc_primitives::{ConnectionState, PeerAddress};
use thiserror::Error;

use crate::policy::PolicyStoreError;

/// Why the service refused a command.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("connection policy forbids connecting to {0}")]
    PolicyRejected(PeerAddress),
    #[error("connection registry at capacity ({capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("operation not valid while {0}")]
    InvalidState(ConnectionState),
    #[error("service is not running")]
    NotRunning,
    #[error("no connection for {0}")]
    UnknownPeer(PeerAddress),
    #[error("message has no valid recipient")]
    InvalidMessage,
    #[error("connection inbox is full")]
    InboxFull,
    #[error(transparent)]
    PolicyStore(#[from] PolicyStoreError),
}

impl From<CommandError> for ServiceError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::InvalidState(state) => Self::InvalidState(state),
            CommandError::InboxFull => Self::InboxFull,
            // Connections are only retired on eviction or service stop.
            CommandError::Retired => Self::NotRunning,
        }
    }
}
