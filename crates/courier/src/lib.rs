//! Routing-slip execution and compensation.
//!
//! Each activity is hosted behind two endpoints. The [`ExecuteHost`] runs the
//! activity at the head of a routing slip's itinerary and forwards the slip
//! to the next activity; on a fault it turns the slip around and sends it to
//! the compensate endpoint of the most recently completed activity. The
//! [`CompensateHost`] undoes one activity and keeps walking the activity log
//! backwards until it is empty.
//!
//! Nothing here keeps state between messages: the routing slip carries all
//! of it.

pub mod activities;
pub mod activity;
pub mod codec;
pub mod compensate_host;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod execute_host;
pub mod publisher;
pub mod registry;
pub mod stage;

pub use activities::{CreateShipmentActivity, ProcessPaymentActivity, ReserveInventoryActivity};
pub use activity::{
    Compensator, CompensationResult, Completion, ExecutionResult, Executor, NoCompensation,
    Termination,
};
pub use codec::CourierMessage;
pub use compensate_host::{CompensateHost, CompensateOutcome};
pub use config::CourierConfig;
pub use context::{CompensateContext, ExecuteContext};
pub use dispatcher::{DispatchOutcome, Dispatcher, EventConsumer};
pub use error::{ActivityError, CourierError, Result};
pub use execute_host::{ExecuteHost, ExecuteOutcome};
pub use publisher::{EventPublisher, PublishReport};
pub use registry::{ActivityDefinition, ActivityRegistry};
pub use stage::{CompensateStage, ExecuteStage};
