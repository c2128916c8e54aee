//! Receive endpoints: pulls messages off the transport and hands them to hosts.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Address;
use futures_util::FutureExt;
use futures_util::future::join_all;
use routing_slip::{RoutingSlipEvent, RoutingSlipEventKind};
use transport::{Delivery, ReceiveTransport, SendTransport, TransportMessage};

use crate::codec::CourierMessage;
use crate::compensate_host::{CompensateHost, CompensateOutcome};
use crate::config::CourierConfig;
use crate::error::{CourierError, Result};
use crate::execute_host::{ExecuteHost, ExecuteOutcome};
use crate::registry::{ActivityDefinition, ActivityRegistry};

/// Receives routing-slip lifecycle events delivered to a subscription address.
///
/// Returning [`CourierError::Consumer`] asks for redelivery.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    async fn consume(&self, event: &RoutingSlipEvent) -> Result<()>;
}

/// What handling one message amounted to.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Executed(ExecuteOutcome),
    Compensated(CompensateOutcome),
    Consumed(RoutingSlipEventKind),
}

enum Endpoint<T> {
    Execute(ExecuteHost<T>),
    Compensate(CompensateHost<T>),
    Consumer(Arc<dyn EventConsumer>),
}

/// Routes each bound address to its Execute Host, Compensate Host or event consumer.
///
/// Error policy per message:
/// - success: acknowledged
/// - retryable error: handed back for redelivery until `max_redeliveries`, then dead-lettered
/// - anything else (protocol mismatch, unknown or undecodable message): discarded
pub struct Dispatcher<T> {
    transport: T,
    endpoints: BTreeMap<Address, Endpoint<T>>,
    host_name: String,
    max_redeliveries: u32,
    idle_poll_interval: Duration,
}

impl<T> Dispatcher<T>
where
    T: SendTransport + ReceiveTransport + Clone,
{
    /// Creates a dispatcher with no bound addresses.
    pub fn new(transport: T, config: &CourierConfig) -> Self {
        Self {
            transport,
            endpoints: BTreeMap::new(),
            host_name: config.host_name.clone(),
            max_redeliveries: config.max_redeliveries,
            idle_poll_interval: config.idle_poll_interval,
        }
    }

    /// Binds both endpoints of every registered activity.
    pub fn from_registry(registry: &ActivityRegistry, transport: T, config: &CourierConfig) -> Self {
        let mut dispatcher = Self::new(transport, config);
        for definition in registry.definitions() {
            dispatcher.bind_activity(definition);
        }
        dispatcher
    }

    /// Binds the execute and compensate endpoints of one activity.
    pub fn bind_activity(&mut self, definition: &ActivityDefinition) -> &mut Self {
        let execute = ExecuteHost::new(definition.clone(), self.transport.clone(), &self.host_name);
        let compensate =
            CompensateHost::new(definition.clone(), self.transport.clone(), &self.host_name);
        self.endpoints
            .insert(definition.execute_address.clone(), Endpoint::Execute(execute));
        self.endpoints.insert(
            definition.compensate_address.clone(),
            Endpoint::Compensate(compensate),
        );
        self
    }

    /// Binds an event consumer to a subscription address.
    pub fn bind_consumer(
        &mut self,
        address: Address,
        consumer: Arc<dyn EventConsumer>,
    ) -> &mut Self {
        self.endpoints.insert(address, Endpoint::Consumer(consumer));
        self
    }

    /// Bound addresses, in order.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.endpoints.keys()
    }

    /// Decodes `message` and hands it to the endpoint bound at `address`.
    pub async fn dispatch(
        &self,
        address: &Address,
        message: &TransportMessage,
    ) -> Result<DispatchOutcome> {
        let endpoint = self
            .endpoints
            .get(address)
            .ok_or_else(|| CourierError::NoEndpoint(address.clone()))?;

        match (endpoint, CourierMessage::decode(message)?) {
            (Endpoint::Execute(host), CourierMessage::Execute(message)) => {
                host.handle(message).await.map(DispatchOutcome::Executed)
            }
            (Endpoint::Compensate(host), CourierMessage::Compensate(message)) => {
                host.handle(message).await.map(DispatchOutcome::Compensated)
            }
            (Endpoint::Consumer(consumer), CourierMessage::Event(event)) => {
                consumer.consume(&event).await?;
                Ok(DispatchOutcome::Consumed(event.kind()))
            }
            (_, other) => Err(CourierError::UnexpectedMessage {
                address: address.clone(),
                message_type: other.message_type().to_string(),
            }),
        }
    }

    /// Takes every message queued on the bound addresses and handles them.
    ///
    /// Activity hops run concurrently, so a slow activity holds up only its
    /// own routing slip. Events for one consumer are handled in queue order.
    /// Returns how many messages were taken.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn pump(&self) -> Result<usize> {
        let mut batches = Vec::new();
        let mut receive_error = None;
        for (address, endpoint) in &self.endpoints {
            let mut deliveries = Vec::new();
            loop {
                match self.transport.receive(address).await {
                    Ok(Some(delivery)) => deliveries.push(delivery),
                    Ok(None) => break,
                    Err(e) => {
                        receive_error = Some(e);
                        break;
                    }
                }
            }
            match endpoint {
                Endpoint::Consumer(_) if !deliveries.is_empty() => batches.push(deliveries),
                Endpoint::Consumer(_) => {}
                _ => batches.extend(deliveries.into_iter().map(|delivery| vec![delivery])),
            }
            if receive_error.is_some() {
                break;
            }
        }

        let processed: usize = batches.iter().map(Vec::len).sum();
        join_all(batches.into_iter().map(|batch| self.settle_in_order(batch)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        match receive_error {
            Some(e) => Err(e.into()),
            None => Ok(processed),
        }
    }

    /// Pumps until no bound address has anything queued.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let processed = self.pump().await?;
            if processed == 0 {
                return Ok(total);
            }
            total += processed;
        }
    }

    /// Pumps until `shutdown` resolves, sleeping while idle.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!(endpoints = self.endpoints.len(), "dispatcher started");

        loop {
            let processed = match self.pump().await {
                Ok(processed) => processed,
                Err(e) => {
                    tracing::error!(error = %e, "dispatcher pump failed");
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.idle_poll_interval) => {}
                }
            } else if shutdown.as_mut().now_or_never().is_some() {
                break;
            }
        }

        tracing::info!("dispatcher stopped");
    }

    async fn settle_in_order(&self, deliveries: Vec<Delivery>) -> Result<()> {
        for delivery in deliveries {
            self.settle(delivery).await?;
        }
        Ok(())
    }

    async fn settle(&self, delivery: Delivery) -> Result<()> {
        match self.dispatch(&delivery.address, &delivery.message).await {
            Ok(_) => self.transport.ack(&delivery).await?,
            Err(e) if e.is_retryable() => {
                if delivery.message.redelivery_count < self.max_redeliveries {
                    tracing::warn!(
                        address = %delivery.address,
                        redelivery_count = delivery.message.redelivery_count,
                        error = %e,
                        "message failed, redelivering"
                    );
                    self.transport.nack(delivery).await?;
                } else {
                    metrics::counter!("courier_messages_dead_lettered_total").increment(1);
                    self.transport.dead_letter(delivery, e.to_string()).await?;
                }
            }
            Err(e) => {
                tracing::warn!(
                    address = %delivery.address,
                    message_type = %delivery.message.message_type,
                    error = %e,
                    "message discarded"
                );
                metrics::counter!("courier_messages_discarded_total").increment(1);
                self.transport.ack(&delivery).await?;
            }
        }
        Ok(())
    }
}
