use async_trait::async_trait;

use crate::{Address, Result, TransportMessage};

/// A message taken off an endpoint, awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The endpoint the message was received on.
    pub address: Address,

    /// The received message.
    pub message: TransportMessage,
}

/// Sending half of a transport.
///
/// Implementations must be safe to share between concurrently running
/// handlers (Send + Sync). Delivery is expected to be at-least-once.
#[async_trait]
pub trait SendTransport: Send + Sync {
    /// Sends a message to the given address.
    async fn send(&self, address: &Address, message: TransportMessage) -> Result<()>;
}

/// Receiving half of a transport.
#[async_trait]
pub trait ReceiveTransport: Send + Sync {
    /// Takes the next message waiting on `address`, if there is one.
    async fn receive(&self, address: &Address) -> Result<Option<Delivery>>;

    /// Acknowledges a delivery; it will not be seen again.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Hands a delivery back for redelivery.
    async fn nack(&self, delivery: Delivery) -> Result<()>;

    /// Moves a delivery out of circulation with the reason it could not be processed.
    async fn dead_letter(&self, delivery: Delivery, reason: String) -> Result<()>;
}
