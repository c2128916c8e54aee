//! Timeline error types.

use thiserror::Error;

/// Errors that can occur while projecting lifecycle events.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A lifecycle event body could not be decoded.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A view rejected an event.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;
