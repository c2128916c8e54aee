//! Courier error types.

use common::{Address, TrackingNumber};
use routing_slip::{ExceptionInfo, RoutingSlipError};
use thiserror::Error;
use transport::TransportError;

/// Errors raised by the hosts and the dispatcher.
#[derive(Debug, Error)]
pub enum CourierError {
    /// The slip's itinerary head (or log tail) names a different activity
    /// than the one hosted at the receiving endpoint.
    #[error(
        "Protocol mismatch for routing slip {tracking_number}: expected '{expected}', found {actual}"
    )]
    ProtocolMismatch {
        tracking_number: TrackingNumber,
        expected: String,
        actual: String,
    },

    /// No activity is registered under this name.
    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    /// The transport message type is not one the engine understands.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// A known message arrived at an endpoint that does not handle it.
    #[error("Endpoint {address} does not accept {message_type} messages")]
    UnexpectedMessage {
        address: Address,
        message_type: String,
    },

    /// Nothing is bound to the address.
    #[error("No endpoint bound to {0}")]
    NoEndpoint(Address),

    /// An event consumer could not process an event.
    #[error("Event consumer failed: {0}")]
    Consumer(String),

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Routing slip error.
    #[error("Routing slip error: {0}")]
    RoutingSlip(#[from] RoutingSlipError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CourierError {
    /// Returns true if redelivering the same message could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CourierError::Transport(_) | CourierError::Consumer(_))
    }
}

/// Convenience type alias for courier results.
pub type Result<T> = std::result::Result<T, CourierError>;

/// An error returned by activity code.
///
/// The hosts never propagate it: it becomes the fault (or compensation
/// failure) recorded on the routing slip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ActivityError {
    pub kind: String,
    pub message: String,
}

impl ActivityError {
    /// Creates an error of type `kind`.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        ActivityError::new("InvalidArguments", err.to_string())
    }
}

impl From<ActivityError> for ExceptionInfo {
    fn from(err: ActivityError) -> Self {
        ExceptionInfo::new(err.kind, err.message)
    }
}

/// Turns a panic payload caught around activity code into a fault.
pub(crate) fn panic_exception(payload: Box<dyn std::any::Any + Send>) -> ExceptionInfo {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "activity panicked".to_string());
    ExceptionInfo::new("Panic", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_exceptions() {
        let info = panic_exception(Box::new("boom"));
        assert_eq!(info.exception_type, "Panic");
        assert_eq!(info.message, "boom");

        let info = panic_exception(Box::new(String::from("kaboom")));
        assert_eq!(info.message, "kaboom");

        let info = panic_exception(Box::new(42_u8));
        assert_eq!(info.message, "activity panicked");
    }

    #[test]
    fn only_transport_and_consumer_errors_are_retryable() {
        let transport = CourierError::Transport(TransportError::Unreachable {
            address: Address::new("queue:a"),
            reason: "down".into(),
        });
        let mismatch = CourierError::ProtocolMismatch {
            tracking_number: TrackingNumber::new(),
            expected: "a".into(),
            actual: "'b'".into(),
        };

        assert!(transport.is_retryable());
        assert!(CourierError::Consumer("busy".into()).is_retryable());
        assert!(!mismatch.is_retryable());
        assert!(!CourierError::UnknownMessageType("Ping".into()).is_retryable());
    }

    #[test]
    fn activity_error_becomes_exception_info() {
        let info: ExceptionInfo = ActivityError::new("PaymentDeclined", "card declined").into();
        assert_eq!(info.exception_type, "PaymentDeclined");
        assert_eq!(info.message, "card declined");
    }

    #[test]
    fn json_errors_are_invalid_arguments() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let activity_error = ActivityError::from(err);
        assert_eq!(activity_error.kind, "InvalidArguments");
    }
}
