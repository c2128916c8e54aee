//! The routing slip: a self-describing message that coordinates a
//! multi-step process across independent services.
//!
//! A routing slip carries its own itinerary (steps still to run), activity
//! log (steps already run, newest last), and process variables. Every hop
//! produces a new slip value from the one it received; nothing here mutates
//! a slip in place.
//!
//! - [`RoutingSlipBuilder`] creates the initial slip
//! - [`ItineraryBuilder`] revises the remaining itinerary during a hop
//! - [`RoutingSlipEvent`] is the set of lifecycle events published to subscribers
//! - [`ExecuteActivity`] / [`CompensateActivity`] are the wire messages

pub mod builder;
pub mod error;
pub mod events;
pub mod messages;
pub mod slip;
pub mod subscription;

pub use builder::{ItineraryBuilder, ItineraryRevision, RoutingSlipBuilder};
pub use common::{Address, ExecutionId, TrackingNumber};
pub use error::{Result, RoutingSlipError};
pub use events::RoutingSlipEvent;
pub use messages::{CompensateActivity, ExecuteActivity};
pub use slip::{
    ActivityException, ActivityLogEntry, ActivityStep, Arguments, ExceptionInfo, PendingAction,
    RoutingSlip, Variables, to_object,
};
pub use subscription::{RoutingSlipEventKind, Subscription};
