use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Address, Delivery, ReceiveTransport, Result, SendTransport, TransportError, TransportMessage,
};

/// A message that was taken out of circulation.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// The endpoint the message was addressed to.
    pub address: Address,
    /// The message itself.
    pub message: TransportMessage,
    /// Why it was dead-lettered.
    pub reason: String,
    /// When it was dead-lettered.
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct InMemoryTransportState {
    queues: HashMap<Address, VecDeque<TransportMessage>>,
    /// Send history, kept only by a [`InMemoryTransport::recording`] transport.
    sent: Option<Vec<(Address, TransportMessage)>>,
    sent_count: usize,
    unreachable: HashSet<Address>,
    dead_letters: Vec<DeadLetter>,
    acknowledged: usize,
}

/// In-process transport with one FIFO queue per address.
///
/// Acknowledged messages are dropped; only a transport created with
/// [`InMemoryTransport::recording`] keeps a copy of every send for
/// inspection. Cloning shares the underlying queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<InMemoryTransportState>>,
}

impl InMemoryTransport {
    /// Creates a new empty transport that keeps no send history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty transport that records every send.
    pub fn recording() -> Self {
        let state = InMemoryTransportState {
            sent: Some(Vec::new()),
            ..InMemoryTransportState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Makes sends to `address` fail (or succeed again).
    pub async fn set_unreachable(&self, address: &Address, unreachable: bool) {
        let mut state = self.state.write().await;
        if unreachable {
            state.unreachable.insert(address.clone());
        } else {
            state.unreachable.remove(address);
        }
    }

    /// Returns every message sent so far, in send order. Empty unless recording.
    pub async fn sent_messages(&self) -> Vec<(Address, TransportMessage)> {
        self.state.read().await.sent.clone().unwrap_or_default()
    }

    /// Returns the messages sent to one address, in send order.
    pub async fn sent_to(&self, address: &Address) -> Vec<TransportMessage> {
        self.state
            .read()
            .await
            .sent
            .iter()
            .flatten()
            .filter(|(to, _)| to == address)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Returns the total number of sends, including redeliveries.
    pub async fn sent_count(&self) -> usize {
        self.state.read().await.sent_count
    }

    /// Returns the number of messages waiting on `address`.
    pub async fn pending(&self, address: &Address) -> usize {
        self.state
            .read()
            .await
            .queues
            .get(address)
            .map_or(0, VecDeque::len)
    }

    /// Returns the number of messages waiting on all addresses.
    pub async fn pending_total(&self) -> usize {
        self.state.read().await.queues.values().map(VecDeque::len).sum()
    }

    /// Returns the number of acknowledged deliveries.
    pub async fn acknowledged(&self) -> usize {
        self.state.read().await.acknowledged
    }

    /// Returns all dead-lettered messages.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.read().await.dead_letters.clone()
    }

    /// Clears queues, history and dead letters.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.queues.clear();
        if let Some(sent) = state.sent.as_mut() {
            sent.clear();
        }
        state.sent_count = 0;
        state.dead_letters.clear();
        state.acknowledged = 0;
    }
}

#[async_trait]
impl SendTransport for InMemoryTransport {
    async fn send(&self, address: &Address, message: TransportMessage) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.unreachable.contains(address) {
                return Err(TransportError::Unreachable {
                    address: address.clone(),
                    reason: "endpoint marked unreachable".to_string(),
                });
            }

            tracing::trace!(%address, message_type = %message.message_type, "message queued");
            state.sent_count += 1;
            if let Some(sent) = state.sent.as_mut() {
                sent.push((address.clone(), message.clone()));
            }
            state
                .queues
                .entry(address.clone())
                .or_default()
                .push_back(message);
        }

        metrics::counter!("transport_messages_sent_total").increment(1);
        Ok(())
    }
}

#[async_trait]
impl ReceiveTransport for InMemoryTransport {
    async fn receive(&self, address: &Address) -> Result<Option<Delivery>> {
        let mut state = self.state.write().await;
        let message = state
            .queues
            .get_mut(address)
            .and_then(VecDeque::pop_front);

        Ok(message.map(|message| Delivery {
            address: address.clone(),
            message,
        }))
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<()> {
        self.state.write().await.acknowledged += 1;
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state
                .queues
                .entry(delivery.address)
                .or_default()
                .push_back(delivery.message.redelivered());
        }
        metrics::counter!("transport_messages_redelivered_total").increment(1);
        Ok(())
    }

    async fn dead_letter(&self, delivery: Delivery, reason: String) -> Result<()> {
        tracing::warn!(
            address = %delivery.address,
            message_id = %delivery.message.message_id,
            %reason,
            "message dead-lettered"
        );
        self.state.write().await.dead_letters.push(DeadLetter {
            address: delivery.address,
            message: delivery.message,
            reason,
            dead_lettered_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sequence: u32) -> TransportMessage {
        TransportMessage::new("Ping", serde_json::json!({ "sequence": sequence }))
    }

    #[tokio::test]
    async fn send_and_receive_in_order() {
        let transport = InMemoryTransport::new();
        let address = Address::new("queue:ping");

        transport.send(&address, message(1)).await.unwrap();
        transport.send(&address, message(2)).await.unwrap();
        assert_eq!(transport.pending(&address).await, 2);

        let first = transport.receive(&address).await.unwrap().unwrap();
        let second = transport.receive(&address).await.unwrap().unwrap();
        assert_eq!(first.message.body["sequence"], 1);
        assert_eq!(second.message.body["sequence"], 2);
        assert!(transport.receive(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn receive_on_unknown_address_is_empty() {
        let transport = InMemoryTransport::new();
        let result = transport.receive(&Address::new("queue:nobody")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn sent_history_is_per_address() {
        let transport = InMemoryTransport::recording();
        let a = Address::new("queue:a");
        let b = Address::new("queue:b");

        transport.send(&a, message(1)).await.unwrap();
        transport.send(&b, message(2)).await.unwrap();
        transport.send(&a, message(3)).await.unwrap();

        assert_eq!(transport.sent_count().await, 3);
        assert_eq!(transport.sent_to(&a).await.len(), 2);
        assert_eq!(transport.sent_to(&b).await.len(), 1);
        assert_eq!(transport.pending_total().await, 3);
    }

    #[tokio::test]
    async fn unreachable_address_rejects_sends() {
        let transport = InMemoryTransport::new();
        let address = Address::new("queue:down");
        transport.set_unreachable(&address, true).await;

        let result = transport.send(&address, message(1)).await;
        assert!(matches!(result, Err(TransportError::Unreachable { .. })));
        assert_eq!(transport.sent_count().await, 0);

        transport.set_unreachable(&address, false).await;
        transport.send(&address, message(1)).await.unwrap();
        assert_eq!(transport.pending(&address).await, 1);
    }

    #[tokio::test]
    async fn nack_requeues_with_redelivery_count() {
        let transport = InMemoryTransport::new();
        let address = Address::new("queue:retry");
        transport.send(&address, message(1)).await.unwrap();

        let delivery = transport.receive(&address).await.unwrap().unwrap();
        transport.nack(delivery).await.unwrap();

        let again = transport.receive(&address).await.unwrap().unwrap();
        assert_eq!(again.message.redelivery_count, 1);
        transport.ack(&again).await.unwrap();
        assert_eq!(transport.acknowledged().await, 1);
    }

    #[tokio::test]
    async fn dead_letter_records_reason() {
        let transport = InMemoryTransport::new();
        let address = Address::new("queue:poison");
        transport.send(&address, message(1)).await.unwrap();

        let delivery = transport.receive(&address).await.unwrap().unwrap();
        transport
            .dead_letter(delivery, "retries exhausted".to_string())
            .await
            .unwrap();

        let dead = transport.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].address, address);
        assert_eq!(dead[0].reason, "retries exhausted");
        assert_eq!(transport.pending(&address).await, 0);
    }

    #[tokio::test]
    async fn plain_transport_keeps_no_history() {
        let transport = InMemoryTransport::new();
        let address = Address::new("queue:busy");

        for sequence in 0..1000 {
            transport.send(&address, message(sequence)).await.unwrap();
            let delivery = transport.receive(&address).await.unwrap().unwrap();
            transport.ack(&delivery).await.unwrap();
        }

        assert_eq!(transport.pending_total().await, 0);
        assert_eq!(transport.sent_count().await, 1000);
        assert!(transport.sent_messages().await.is_empty());
        assert!(transport.sent_to(&address).await.is_empty());
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let transport = InMemoryTransport::recording();
        let address = Address::new("queue:clear");
        transport.send(&address, message(1)).await.unwrap();

        transport.clear().await;
        assert_eq!(transport.sent_count().await, 0);
        assert!(transport.sent_messages().await.is_empty());
        assert_eq!(transport.pending_total().await, 0);
    }
}
