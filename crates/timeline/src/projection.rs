//! Folding lifecycle events into views, and how far each view has read.

use async_trait::async_trait;
use routing_slip::RoutingSlipEvent;

use crate::Result;

/// How much of the processor's event journal a view has folded in.
///
/// The count doubles as the journal index of the next event to deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// A view that has seen nothing, as after a reset.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The position after one more event.
    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed.saturating_add(1),
        }
    }

    /// Index of the first journaled event this view has not seen.
    pub fn journal_index(&self) -> usize {
        usize::try_from(self.events_processed).unwrap_or(usize::MAX)
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// A view over routing slip lifecycle events.
///
/// Every event advances the position, including kinds the view ignores,
/// so catch-up can resume from the journal index alone.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Stable view name, used as the metrics label.
    fn name(&self) -> &'static str;

    /// Folds one lifecycle event into the view.
    async fn handle(&self, event: &RoutingSlipEvent) -> Result<()>;

    /// How far into the journal the view has read.
    async fn position(&self) -> ProjectionPosition;

    /// Forgets every tracked slip so the journal can be replayed from the start.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_view_reads_from_the_start_of_the_journal() {
        let position = ProjectionPosition::zero();
        assert_eq!(position, ProjectionPosition::default());
        assert_eq!(position.journal_index(), 0);
    }

    #[test]
    fn each_event_moves_the_journal_index() {
        let position = ProjectionPosition::zero().advance().advance();
        assert_eq!(position.events_processed, 2);
        assert_eq!(position.journal_index(), 2);
        assert_eq!(position.to_string(), "position(2)");
    }
}
