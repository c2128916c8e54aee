//! Mapping between engine messages and transport envelopes.

use routing_slip::{CompensateActivity, ExecuteActivity, RoutingSlipEvent};
use transport::TransportMessage;

use crate::error::{CourierError, Result};

/// Every message the engine sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum CourierMessage {
    Execute(ExecuteActivity),
    Compensate(CompensateActivity),
    Event(RoutingSlipEvent),
}

impl CourierMessage {
    /// Message type used for lifecycle events.
    pub const EVENT_MESSAGE_TYPE: &'static str = "RoutingSlipEvent";

    /// Returns the transport message type for this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            CourierMessage::Execute(_) => ExecuteActivity::MESSAGE_TYPE,
            CourierMessage::Compensate(_) => CompensateActivity::MESSAGE_TYPE,
            CourierMessage::Event(_) => Self::EVENT_MESSAGE_TYPE,
        }
    }

    /// Wraps the message in a transport envelope correlated by tracking number.
    pub fn encode(&self) -> Result<TransportMessage> {
        let (body, tracking_number) = match self {
            CourierMessage::Execute(message) => {
                (serde_json::to_value(message)?, message.tracking_number())
            }
            CourierMessage::Compensate(message) => {
                (serde_json::to_value(message)?, message.tracking_number())
            }
            CourierMessage::Event(event) => (serde_json::to_value(event)?, event.tracking_number()),
        };
        Ok(TransportMessage::new(self.message_type(), body).with_correlation_id(tracking_number))
    }

    /// Decodes a transport envelope by its message type.
    pub fn decode(message: &TransportMessage) -> Result<Self> {
        match message.message_type.as_str() {
            ExecuteActivity::MESSAGE_TYPE => Ok(CourierMessage::Execute(message.decode_body()?)),
            CompensateActivity::MESSAGE_TYPE => {
                Ok(CourierMessage::Compensate(message.decode_body()?))
            }
            Self::EVENT_MESSAGE_TYPE => Ok(CourierMessage::Event(message.decode_body()?)),
            other => Err(CourierError::UnknownMessageType(other.to_string())),
        }
    }
}

impl From<ExecuteActivity> for CourierMessage {
    fn from(message: ExecuteActivity) -> Self {
        CourierMessage::Execute(message)
    }
}

impl From<CompensateActivity> for CourierMessage {
    fn from(message: CompensateActivity) -> Self {
        CourierMessage::Compensate(message)
    }
}

impl From<RoutingSlipEvent> for CourierMessage {
    fn from(event: RoutingSlipEvent) -> Self {
        CourierMessage::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Address;
    use routing_slip::{ActivityStep, RoutingSlipBuilder};
    use serde_json::json;

    fn execute() -> ExecuteActivity {
        let slip = RoutingSlipBuilder::new()
            .add_activity(ActivityStep::new(
                "reserve_inventory",
                Address::new("queue:reserve_inventory_execute"),
                Address::new("queue:reserve_inventory_compensate"),
            ))
            .build()
            .unwrap();
        ExecuteActivity::new(slip)
    }

    #[test]
    fn encode_sets_type_and_correlation() {
        let message = execute();
        let envelope = CourierMessage::from(message.clone()).encode().unwrap();

        assert_eq!(envelope.message_type, "ExecuteActivity");
        assert_eq!(envelope.correlation_id, Some(message.tracking_number()));
        assert_eq!(
            CourierMessage::decode(&envelope).unwrap(),
            CourierMessage::Execute(message)
        );
    }

    #[test]
    fn events_use_a_single_message_type() {
        let message = execute();
        let event = RoutingSlipEvent::completed(&message.routing_slip);
        let envelope = CourierMessage::from(event).encode().unwrap();

        assert_eq!(envelope.message_type, "RoutingSlipEvent");
        assert!(matches!(
            CourierMessage::decode(&envelope).unwrap(),
            CourierMessage::Event(RoutingSlipEvent::Completed(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let envelope = TransportMessage::new("Ping", json!({}));
        assert!(matches!(
            CourierMessage::decode(&envelope),
            Err(CourierError::UnknownMessageType(t)) if t == "Ping"
        ));
    }

    #[test]
    fn malformed_body_is_a_serialization_error() {
        let envelope = TransportMessage::new("CompensateActivity", json!({"routing_slip": 42}));
        assert!(matches!(
            CourierMessage::decode(&envelope),
            Err(CourierError::Serialization(_))
        ));
    }
}
