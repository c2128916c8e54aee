//! Routing slip submission and timeline endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Address, TrackingNumber};
use courier::{ActivityRegistry, CourierMessage};
use routing_slip::{Arguments, ExecuteActivity, RoutingSlipBuilder, Subscription, Variables};
use serde::{Deserialize, Serialize};
use timeline::{
    ActivityStatsView, RoutingSlipStatus, RoutingSlipTimeline, RoutingSlipTimelineView,
};
use transport::SendTransport;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<T: SendTransport> {
    pub registry: Arc<ActivityRegistry>,
    pub transport: T,
    pub timelines: RoutingSlipTimelineView,
    pub activity_stats: ActivityStatsView,
    /// Every submitted routing slip subscribes this address to all events.
    pub timeline_address: Address,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SubmitRoutingSlipRequest {
    pub activities: Vec<ActivityRequest>,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Deserialize)]
pub struct ActivityRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<RoutingSlipStatus>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SubmittedResponse {
    pub tracking_number: String,
    pub status: RoutingSlipStatus,
    pub next_address: String,
}

#[derive(Serialize)]
pub struct RoutingSlipSummary {
    pub tracking_number: String,
    pub status: RoutingSlipStatus,
    pub executed: usize,
    pub compensated: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RoutingSlipTimeline> for RoutingSlipSummary {
    fn from(timeline: &RoutingSlipTimeline) -> Self {
        Self {
            tracking_number: timeline.tracking_number.to_string(),
            status: timeline.status,
            executed: timeline.executed.len(),
            compensated: timeline.compensated.len(),
            started_at: timeline.started_at,
            updated_at: timeline.updated_at,
        }
    }
}

// -- Handlers --

/// POST /routing-slips — build a routing slip and send it to its first activity.
#[tracing::instrument(skip(state, req))]
pub async fn submit<T: SendTransport + Clone + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Json(req): Json<SubmitRoutingSlipRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let mut builder = RoutingSlipBuilder::new()
        .add_variables(req.variables)
        .add_subscription(Subscription::all(state.timeline_address.clone()));
    for activity in &req.activities {
        builder = builder.add_activity(state.registry.step(&activity.name, &activity.arguments)?);
    }
    let slip = builder.build()?;

    let tracking_number = slip.tracking_number();
    let address = slip
        .next_address()
        .cloned()
        .ok_or_else(|| ApiError::Internal("routing slip has no first activity".to_string()))?;
    let message = CourierMessage::from(ExecuteActivity::new(slip)).encode()?;
    state.transport.send(&address, message).await?;
    // After the send: a slip the transport refused is never tracked.
    state.timelines.track(tracking_number).await;

    metrics::counter!("api_routing_slips_submitted_total").increment(1);
    tracing::info!(%tracking_number, %address, "routing slip submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmittedResponse {
            tracking_number: tracking_number.to_string(),
            status: RoutingSlipStatus::Running,
            next_address: address.to_string(),
        }),
    ))
}

/// GET /routing-slips — list tracked routing slips, optionally by status.
#[tracing::instrument(skip(state, query))]
pub async fn list<T: SendTransport + Clone + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<RoutingSlipSummary>> {
    let timelines = match query.status {
        Some(status) => state.timelines.by_status(status).await,
        None => state.timelines.all().await,
    };
    Json(timelines.iter().map(RoutingSlipSummary::from).collect())
}

/// GET /routing-slips/{tracking_number} — the full event timeline of one routing slip.
#[tracing::instrument(skip(state))]
pub async fn get<T: SendTransport + Clone + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<RoutingSlipTimeline>, ApiError> {
    let tracking_number = parse_tracking_number(&tracking_number)?;
    state
        .timelines
        .get(tracking_number)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Routing slip {tracking_number} not found")))
}

fn parse_tracking_number(value: &str) -> Result<TrackingNumber, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid tracking number: {e}")))
}
