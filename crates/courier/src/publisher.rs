//! Lifecycle event publication to routing-slip subscribers.

use futures_util::future::join_all;
use routing_slip::{RoutingSlip, RoutingSlipEvent};
use transport::SendTransport;

use crate::codec::CourierMessage;

/// How a single event fanned out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl PublishReport {
    /// Number of subscriptions the event matched.
    pub fn matched(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Sends lifecycle events to the subscriptions a routing slip carries.
///
/// A failing subscriber never affects the others, and never fails the hop
/// that published: failures are logged, counted and reported.
#[derive(Debug, Clone)]
pub struct EventPublisher<T> {
    transport: T,
}

impl<T: SendTransport> EventPublisher<T> {
    /// Creates a publisher that sends on `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Publishes `event` to every subscription on `slip` that matches it.
    #[tracing::instrument(
        skip(self, slip, event),
        fields(tracking_number = %slip.tracking_number(), event = %event.kind())
    )]
    pub async fn publish(&self, slip: &RoutingSlip, event: &RoutingSlipEvent) -> PublishReport {
        let kind = event.kind();
        let targets: Vec<_> = slip
            .subscriptions()
            .iter()
            .filter(|subscription| subscription.matches(kind, event.activity_name()))
            .map(|subscription| &subscription.address)
            .collect();

        if targets.is_empty() {
            return PublishReport::default();
        }

        let message = match CourierMessage::Event(event.clone()).encode() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                metrics::counter!("courier_event_publish_failures_total")
                    .increment(targets.len() as u64);
                return PublishReport {
                    delivered: 0,
                    failed: targets.len(),
                };
            }
        };

        // Each subscriber gets its own copy with a fresh message id.
        let sends = targets.iter().map(|address| {
            let copy = transport::TransportMessage {
                message_id: transport::MessageId::new(),
                ..message.clone()
            };
            async move { (*address, self.transport.send(address, copy).await) }
        });

        let mut report = PublishReport::default();
        for (address, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::counter!("courier_events_published_total", "event" => kind.as_str())
                        .increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%address, error = %e, "failed to publish event");
                    metrics::counter!("courier_event_publish_failures_total").increment(1);
                }
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }
}
