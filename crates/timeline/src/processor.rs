//! Projection processor for feeding lifecycle events to projections.

use async_trait::async_trait;
use courier::{CourierError, EventConsumer};
use routing_slip::RoutingSlipEvent;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::Projection;

/// Delivers lifecycle events to projections and journals them for replay.
///
/// The processor supports:
/// - Single event delivery: journals the event and brings every projection up to date
/// - Catch-up: delivers journaled events a projection has not seen yet
/// - Rebuild: resets all projections and replays the journal
///
/// Bound as a dispatcher event consumer it feeds every registered view from
/// one subscription address.
pub struct ProjectionProcessor {
    projections: Vec<Box<dyn Projection>>,
    journal: RwLock<Vec<RoutingSlipEvent>>,
}

impl ProjectionProcessor {
    /// Creates a processor with no projections and an empty journal.
    pub fn new() -> Self {
        Self {
            projections: Vec::new(),
            journal: RwLock::new(Vec::new()),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Returns the number of journaled events.
    pub async fn journal_len(&self) -> usize {
        self.journal.read().await.len()
    }

    /// Journals one event and delivers it, plus anything missed, to every projection.
    #[tracing::instrument(skip(self, event), fields(event = %event.kind(), tracking_number = %event.tracking_number()))]
    pub async fn process_event(&self, event: &RoutingSlipEvent) -> Result<()> {
        {
            let mut journal = self.journal.write().await;
            // A redelivery after a failed catch-up is already journaled.
            if journal.last() != Some(event) {
                journal.push(event.clone());
            }
        }
        self.run_catch_up().await
    }

    /// Delivers every journaled event each projection has not seen yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let journal = self.journal.read().await;

        for projection in &self.projections {
            let seen = projection.position().await.journal_index();
            for event in journal.iter().skip(seen) {
                projection.handle(event).await?;
                metrics::counter!("timeline_events_processed_total", "projection" => projection.name())
                    .increment(1);
            }
        }

        tracing::debug!(events = journal.len(), "catch-up complete");
        Ok(())
    }

    /// Resets all projections and replays the journal.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}

impl Default for ProjectionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventConsumer for ProjectionProcessor {
    async fn consume(&self, event: &RoutingSlipEvent) -> courier::Result<()> {
        self.process_event(event)
            .await
            .map_err(|e| CourierError::Consumer(e.to_string()))
    }
}
