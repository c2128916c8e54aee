//! Routing slip error types.

use thiserror::Error;

/// Errors raised while building or advancing a routing slip.
#[derive(Debug, Error)]
pub enum RoutingSlipError {
    /// A routing slip needs at least one activity to be sent anywhere.
    #[error("Routing slip has an empty itinerary")]
    EmptyItinerary,

    /// Compensation was requested but nothing has been executed.
    #[error("Routing slip has an empty activity log")]
    EmptyActivityLog,

    /// Arguments or variables must serialize to a JSON object.
    #[error("Invalid arguments for activity '{activity}': {reason}")]
    InvalidArguments { activity: String, reason: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for routing slip results.
pub type Result<T> = std::result::Result<T, RoutingSlipError>;
