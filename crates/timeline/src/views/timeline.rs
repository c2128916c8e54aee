//! Routing slip timeline read model: every lifecycle event per tracking number.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ExecutionId, TrackingNumber};
use courier::{CourierError, EventConsumer};
use routing_slip::{
    ActivityException, ExceptionInfo, RoutingSlipEvent, RoutingSlipEventKind, Variables,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Where a routing slip stands, as far as its events tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingSlipStatus {
    Running,
    Completed,
    Faulted,
    Terminated,
}

impl RoutingSlipStatus {
    /// Returns true once a routing-slip level event has been seen.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RoutingSlipStatus::Running)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingSlipStatus::Running => "Running",
            RoutingSlipStatus::Completed => "Completed",
            RoutingSlipStatus::Faulted => "Faulted",
            RoutingSlipStatus::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for RoutingSlipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event as it appears on a timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub kind: RoutingSlipEventKind,
    pub activity_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

impl TimelineEntry {
    fn from_event(event: &RoutingSlipEvent) -> Self {
        let exception = match event {
            RoutingSlipEvent::ActivityFaulted(e) => Some(e.exception_info.clone()),
            RoutingSlipEvent::CompensationFailed(e) => Some(e.exception_info.clone()),
            _ => None,
        };
        Self {
            kind: event.kind(),
            activity_name: event.activity_name().map(str::to_string),
            timestamp: event.timestamp(),
            duration_ms: event.duration_ms(),
            exception,
        }
    }
}

/// Everything known about one routing slip.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingSlipTimeline {
    pub tracking_number: TrackingNumber,
    pub status: RoutingSlipStatus,
    /// Events in arrival order.
    pub entries: Vec<TimelineEntry>,
    /// Activities that executed, in order.
    pub executed: Vec<String>,
    /// Activities that were undone, in the order they were undone.
    pub compensated: Vec<String>,
    /// Activities whose undo failed.
    pub compensation_failures: Vec<String>,
    /// The activity whose fault turned the slip around.
    pub faulted_activity: Option<String>,
    /// Filled in from the terminal Faulted event.
    pub activity_exceptions: Vec<ActivityException>,
    /// Variables as of the latest event that carried them.
    pub variables: Variables,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Total run time, once terminal.
    pub duration_ms: Option<u64>,
    /// Why the slip was terminated early.
    pub reason: Option<String>,
    #[serde(skip)]
    seen: HashSet<(RoutingSlipEventKind, ExecutionId)>,
}

impl RoutingSlipTimeline {
    fn new(tracking_number: TrackingNumber, started_at: DateTime<Utc>) -> Self {
        Self {
            tracking_number,
            status: RoutingSlipStatus::Running,
            entries: Vec::new(),
            executed: Vec::new(),
            compensated: Vec::new(),
            compensation_failures: Vec::new(),
            faulted_activity: None,
            activity_exceptions: Vec::new(),
            variables: Variables::new(),
            started_at,
            updated_at: started_at,
            duration_ms: None,
            reason: None,
            seen: HashSet::new(),
        }
    }

    /// Returns the event kinds in arrival order.
    pub fn kinds(&self) -> Vec<RoutingSlipEventKind> {
        self.entries.iter().map(|entry| entry.kind).collect()
    }

    fn apply(&mut self, event: &RoutingSlipEvent) {
        let execution_id = match event {
            RoutingSlipEvent::ActivityCompleted(e) => Some(e.execution_id),
            RoutingSlipEvent::ActivityFaulted(e) => Some(e.execution_id),
            RoutingSlipEvent::ActivityCompensated(e) => Some(e.execution_id),
            RoutingSlipEvent::CompensationFailed(e) => Some(e.execution_id),
            _ => None,
        };
        // Redelivered copies of an activity event are recorded once.
        if let Some(execution_id) = execution_id
            && !self.seen.insert((event.kind(), execution_id))
        {
            return;
        }

        self.entries.push(TimelineEntry::from_event(event));
        self.updated_at = self.updated_at.max(event.timestamp());

        match event {
            RoutingSlipEvent::ActivityCompleted(e) => {
                self.executed.push(e.activity_name.clone());
                self.variables = e.variables.clone();
            }
            RoutingSlipEvent::ActivityFaulted(e) => {
                self.faulted_activity = Some(e.activity_name.clone());
                self.variables = e.variables.clone();
            }
            RoutingSlipEvent::ActivityCompensated(e) => {
                self.compensated.push(e.activity_name.clone());
                self.variables = e.variables.clone();
            }
            RoutingSlipEvent::CompensationFailed(e) => {
                self.compensation_failures.push(e.activity_name.clone());
            }
            RoutingSlipEvent::Completed(e) => {
                if self.finish(RoutingSlipStatus::Completed, e.duration_ms) {
                    self.variables = e.variables.clone();
                }
            }
            RoutingSlipEvent::Faulted(e) => {
                if self.finish(RoutingSlipStatus::Faulted, e.duration_ms) {
                    self.activity_exceptions = e.activity_exceptions.clone();
                    self.variables = e.variables.clone();
                }
            }
            RoutingSlipEvent::Terminated(e) => {
                if self.finish(RoutingSlipStatus::Terminated, e.duration_ms) {
                    self.reason = e.reason.clone();
                    self.variables = e.variables.clone();
                }
            }
        }
    }

    /// The first terminal event decides the status.
    fn finish(&mut self, status: RoutingSlipStatus, duration_ms: u64) -> bool {
        if self.status.is_terminal() {
            tracing::warn!(
                tracking_number = %self.tracking_number,
                current = %self.status,
                ignored = %status,
                "routing slip already finished"
            );
            return false;
        }
        self.status = status;
        self.duration_ms = Some(duration_ms);
        true
    }
}

struct TimelineState {
    timelines: HashMap<TrackingNumber, RoutingSlipTimeline>,
    position: ProjectionPosition,
}

/// Read model of routing slip timelines, keyed by tracking number.
///
/// A timeline appears with the first event for its tracking number, or
/// earlier through [`track`](Self::track) when the submitter wants the slip
/// visible before any activity has run.
#[derive(Clone)]
pub struct RoutingSlipTimelineView {
    state: Arc<RwLock<TimelineState>>,
}

impl RoutingSlipTimelineView {
    pub const NAME: &'static str = "RoutingSlipTimelineView";

    /// Creates a new empty timeline view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TimelineState {
                timelines: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Starts an empty Running timeline; no-op if one exists.
    pub async fn track(&self, tracking_number: TrackingNumber) {
        self.state
            .write()
            .await
            .timelines
            .entry(tracking_number)
            .or_insert_with(|| RoutingSlipTimeline::new(tracking_number, Utc::now()));
    }

    /// Gets the timeline for a routing slip.
    pub async fn get(&self, tracking_number: TrackingNumber) -> Option<RoutingSlipTimeline> {
        self.state
            .read()
            .await
            .timelines
            .get(&tracking_number)
            .cloned()
    }

    /// Gets every timeline, oldest first.
    pub async fn all(&self) -> Vec<RoutingSlipTimeline> {
        let mut timelines: Vec<_> = self.state.read().await.timelines.values().cloned().collect();
        timelines.sort_by_key(|timeline| timeline.started_at);
        timelines
    }

    /// Gets the timelines in the given status, oldest first.
    pub async fn by_status(&self, status: RoutingSlipStatus) -> Vec<RoutingSlipTimeline> {
        let mut timelines: Vec<_> = self
            .state
            .read()
            .await
            .timelines
            .values()
            .filter(|timeline| timeline.status == status)
            .cloned()
            .collect();
        timelines.sort_by_key(|timeline| timeline.started_at);
        timelines
    }
}

impl Default for RoutingSlipTimelineView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for RoutingSlipTimelineView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, event: &RoutingSlipEvent) -> Result<()> {
        let mut state = self.state.write().await;
        let tracking_number = event.tracking_number();
        state
            .timelines
            .entry(tracking_number)
            .or_insert_with(|| RoutingSlipTimeline::new(tracking_number, event.timestamp()))
            .apply(event);
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.timelines.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for RoutingSlipTimelineView {
    async fn consume(&self, event: &RoutingSlipEvent) -> courier::Result<()> {
        self.handle(event)
            .await
            .map_err(|e| CourierError::Consumer(e.to_string()))
    }
}

impl ReadModel for RoutingSlipTimelineView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn count(&self) -> usize {
        // Use try_read to avoid blocking; returns 0 if lock is held
        self.state
            .try_read()
            .map(|state| state.timelines.len())
            .unwrap_or(0)
    }
}
