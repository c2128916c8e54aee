//! HTTP route handlers.

pub mod activities;
pub mod health;
pub mod metrics;
pub mod routing_slips;
