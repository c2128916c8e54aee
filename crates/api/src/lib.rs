//! HTTP host for the routing slip engine.
//!
//! Accepts routing slips over REST, hands them to the in-process dispatcher
//! through the transport, and serves the resulting timelines, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::Address;
use courier::{
    ActivityRegistry, CreateShipmentActivity, Dispatcher, ProcessPaymentActivity,
    ReserveInventoryActivity,
};
use metrics_exporter_prometheus::PrometheusHandle;
use timeline::{ActivityStatsView, ProjectionProcessor, RoutingSlipTimelineView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use transport::{InMemoryTransport, SendTransport};

pub use config::Config;
pub use routes::routing_slips::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<T: SendTransport + Clone + 'static>(
    state: Arc<AppState<T>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<T>))
        .route("/activities", get(routes::activities::list::<T>))
        .route(
            "/routing-slips",
            get(routes::routing_slips::list::<T>).post(routes::routing_slips::submit::<T>),
        )
        .route(
            "/routing-slips/{tracking_number}",
            get(routes::routing_slips::get::<T>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers the sample order activities under `scheme`.
pub fn sample_registry(scheme: &str) -> ActivityRegistry {
    let mut registry = ActivityRegistry::new(scheme);
    registry
        .register(ReserveInventoryActivity::NAME, ReserveInventoryActivity::new())
        .register(ProcessPaymentActivity::NAME, ProcessPaymentActivity::new())
        .register(CreateShipmentActivity::NAME, CreateShipmentActivity::new());
    registry
}

/// Creates the application state and the dispatcher that serves it, wired
/// over one in-memory transport.
///
/// The dispatcher hosts every registered activity plus a projection
/// processor at the timeline address feeding both views.
pub fn create_default_state(
    config: &Config,
    registry: ActivityRegistry,
) -> (
    Arc<AppState<InMemoryTransport>>,
    Arc<Dispatcher<InMemoryTransport>>,
) {
    let transport = InMemoryTransport::new();
    let timelines = RoutingSlipTimelineView::new();
    let activity_stats = ActivityStatsView::new();
    let timeline_address = Address::new(config.timeline_address.clone());

    let mut processor = ProjectionProcessor::new();
    processor.register(Box::new(timelines.clone()));
    processor.register(Box::new(activity_stats.clone()));

    let mut dispatcher = Dispatcher::from_registry(&registry, transport.clone(), &config.courier);
    dispatcher.bind_consumer(timeline_address.clone(), Arc::new(processor));

    let state = Arc::new(AppState {
        registry: Arc::new(registry),
        transport,
        timelines,
        activity_stats,
        timeline_address,
    });

    (state, Arc::new(dispatcher))
}
