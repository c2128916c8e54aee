//! Sample order-fulfillment activities backed by in-memory services.
//!
//! Each keeps its state behind a shared lock so tests can inspect it and
//! toggle failures, and uses the tracking number as its idempotency key.

pub mod inventory;
pub mod payment;
pub mod shipping;

pub use inventory::{
    ReservationItem, ReservationLog, ReserveInventoryActivity, ReserveInventoryArguments,
};
pub use payment::{PaymentLog, ProcessPaymentActivity, ProcessPaymentArguments};
pub use shipping::{CreateShipmentActivity, CreateShipmentArguments, ShipmentLog};
