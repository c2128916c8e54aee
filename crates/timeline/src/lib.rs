//! Read models built from routing slip lifecycle events.
//!
//! - [`Projection`] trait for folding lifecycle events into read models
//! - [`ReadModel`] trait for query access to projected data
//! - [`ProjectionProcessor`] for delivering events to projections, usable as
//!   a dispatcher event consumer
//! - Two views: per-slip timelines and per-activity statistics

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{Result, TimelineError};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    ActivityStats, ActivityStatsView, RoutingSlipStatus, RoutingSlipTimeline,
    RoutingSlipTimelineView, TimelineEntry,
};
