use mapc_primitives::ConnectionState;
use thiserror::Error;

/// Why a handle refused a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("operation not valid while {0}")]
    InvalidState(ConnectionState),
    #[error("connection inbox is full")]
    InboxFull,
    /// The connection was torn down and its actor stopped.
    #[error("connection has been retired")]
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("peer advertises no message access service record")]
    NoRecord,
    #[error("service search failed with status {status}")]
    SearchFailed { status: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
}
