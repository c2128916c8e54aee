//! Registered activity listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use timeline::ActivityStats;
use transport::SendTransport;

use crate::AppState;

#[derive(Serialize)]
pub struct ActivityResponse {
    pub name: String,
    pub execute_address: String,
    pub compensate_address: String,
    /// Absent until the activity has produced an event.
    pub stats: Option<ActivityStats>,
}

/// GET /activities — every registered activity with its addresses and outcome counts.
#[tracing::instrument(skip(state))]
pub async fn list<T: SendTransport + Clone + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<Vec<ActivityResponse>> {
    let mut activities = Vec::with_capacity(state.registry.len());
    for definition in state.registry.definitions() {
        activities.push(ActivityResponse {
            name: definition.name.clone(),
            execute_address: definition.execute_address.to_string(),
            compensate_address: definition.compensate_address.to_string(),
            stats: state.activity_stats.get(&definition.name).await,
        });
    }
    Json(activities)
}
