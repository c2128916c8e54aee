use thiserror::Error;

use crate::Address;

/// Errors surfaced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination could not accept the message.
    #[error("Address {address} unreachable: {reason}")]
    Unreachable { address: Address, reason: String },

    /// A message body could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
