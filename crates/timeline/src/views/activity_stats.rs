//! Activity statistics read model: outcomes aggregated per activity name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use routing_slip::RoutingSlipEvent;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Outcome counts for one activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub activity_name: String,
    pub executions: u64,
    pub faults: u64,
    pub compensations: u64,
    pub compensation_failures: u64,
    /// Summed execution time of successful executions.
    pub total_execution_ms: u64,
}

impl ActivityStats {
    /// Mean execution time of successful executions.
    pub fn average_execution_ms(&self) -> Option<u64> {
        self.total_execution_ms.checked_div(self.executions)
    }
}

struct StatsState {
    activities: BTreeMap<String, ActivityStats>,
    position: ProjectionPosition,
}

/// Read model of per-activity outcome counts.
///
/// Routing-slip level events advance the position but are not counted.
#[derive(Clone)]
pub struct ActivityStatsView {
    state: Arc<RwLock<StatsState>>,
}

impl ActivityStatsView {
    pub const NAME: &'static str = "ActivityStatsView";

    /// Creates a new empty statistics view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StatsState {
                activities: BTreeMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Gets the statistics for one activity.
    pub async fn get(&self, activity_name: &str) -> Option<ActivityStats> {
        self.state
            .read()
            .await
            .activities
            .get(activity_name)
            .cloned()
    }

    /// Gets every activity's statistics, ordered by name.
    pub async fn all(&self) -> Vec<ActivityStats> {
        self.state.read().await.activities.values().cloned().collect()
    }
}

impl Default for ActivityStatsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for ActivityStatsView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, event: &RoutingSlipEvent) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance();

        let Some(activity_name) = event.activity_name() else {
            return Ok(());
        };
        let stats = state
            .activities
            .entry(activity_name.to_string())
            .or_insert_with(|| ActivityStats {
                activity_name: activity_name.to_string(),
                ..ActivityStats::default()
            });

        match event {
            RoutingSlipEvent::ActivityCompleted(e) => {
                stats.executions += 1;
                stats.total_execution_ms += e.duration_ms;
            }
            RoutingSlipEvent::ActivityFaulted(_) => stats.faults += 1,
            RoutingSlipEvent::ActivityCompensated(_) => stats.compensations += 1,
            RoutingSlipEvent::CompensationFailed(_) => stats.compensation_failures += 1,
            RoutingSlipEvent::Completed(_)
            | RoutingSlipEvent::Faulted(_)
            | RoutingSlipEvent::Terminated(_) => {}
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.activities.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for ActivityStatsView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|state| state.activities.len())
            .unwrap_or(0)
    }
}
