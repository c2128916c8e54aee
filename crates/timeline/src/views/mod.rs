//! Read model views over routing slip lifecycle events.

pub mod activity_stats;
pub mod timeline;

pub use activity_stats::{ActivityStats, ActivityStatsView};
pub use timeline::{RoutingSlipStatus, RoutingSlipTimeline, RoutingSlipTimelineView, TimelineEntry};
