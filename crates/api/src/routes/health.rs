//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use timeline::ReadModel;
use transport::SendTransport;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub activities: usize,
    pub routing_slips: usize,
}

/// GET /health — returns host status and what it is tracking.
pub async fn check<T: SendTransport + Clone + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        activities: state.registry.len(),
        routing_slips: state.timelines.count(),
    })
}
