use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::TrackingNumber;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Unique identifier for a transport message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as it travels over the transport.
///
/// The body is kept as JSON; the `message_type` tells the receiving endpoint
/// how to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique identifier for this message.
    pub message_id: MessageId,

    /// Contract name of the body (e.g., "ExecuteActivity").
    pub message_type: String,

    /// Routing slip this message belongs to, if any.
    pub correlation_id: Option<TrackingNumber>,

    /// When the message was created.
    pub sent_at: DateTime<Utc>,

    /// How many times the message has been handed back for redelivery.
    pub redelivery_count: u32,

    /// Free-form transport headers.
    pub headers: BTreeMap<String, String>,

    /// The message body as JSON.
    pub body: serde_json::Value,
}

impl TransportMessage {
    /// Creates a message with a raw JSON body.
    pub fn new(message_type: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            message_id: MessageId::new(),
            message_type: message_type.into(),
            correlation_id: None,
            sent_at: Utc::now(),
            redelivery_count: 0,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Creates a message by serializing `body`.
    pub fn from_body<T: Serialize>(
        message_type: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(message_type, serde_json::to_value(body)?))
    }

    /// Sets the correlation id.
    pub fn with_correlation_id(mut self, tracking_number: TrackingNumber) -> Self {
        self.correlation_id = Some(tracking_number);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Deserializes the body.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Returns a copy marked as one more redelivery of this message.
    pub fn redelivered(&self) -> Self {
        Self {
            redelivery_count: self.redelivery_count + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        sequence: u32,
    }

    #[test]
    fn message_id_new_creates_unique_ids() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn from_body_and_decode() {
        let message = TransportMessage::from_body("Ping", &Ping { sequence: 7 }).unwrap();
        assert_eq!(message.message_type, "Ping");
        assert_eq!(message.redelivery_count, 0);
        assert_eq!(message.decode_body::<Ping>().unwrap(), Ping { sequence: 7 });
    }

    #[test]
    fn headers_and_correlation() {
        let tracking_number = TrackingNumber::new();
        let message = TransportMessage::new("Ping", serde_json::json!({}))
            .with_correlation_id(tracking_number)
            .with_header("source", "test");

        assert_eq!(message.correlation_id, Some(tracking_number));
        assert_eq!(message.headers.get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn redelivered_keeps_identity_and_counts() {
        let message = TransportMessage::new("Ping", serde_json::json!({"sequence": 1}));
        let again = message.redelivered().redelivered();
        assert_eq!(again.message_id, message.message_id);
        assert_eq!(again.body, message.body);
        assert_eq!(again.redelivery_count, 2);
    }
}
