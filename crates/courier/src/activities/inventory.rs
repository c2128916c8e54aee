//! Inventory reservation activity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::TrackingNumber;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::activity::{CompensationResult, Compensator, ExecutionResult, Executor};
use crate::context::{CompensateContext, ExecuteContext};
use crate::error::ActivityError;

/// An item to reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveInventoryArguments {
    pub order_id: String,
    pub items: Vec<ReservationItem>,
}

/// What the compensate step needs to release the reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLog {
    pub reservation_id: String,
}

#[derive(Debug, Default)]
struct InventoryState {
    reservations: HashMap<String, (String, Vec<ReservationItem>)>,
    by_tracking_number: HashMap<TrackingNumber, String>,
    next_id: u32,
    released: usize,
    fail_on_reserve: bool,
    fail_on_release: bool,
}

/// Reserves stock for an order; compensation releases it.
///
/// Sets the `reservation_id` variable.
#[derive(Debug, Clone, Default)]
pub struct ReserveInventoryActivity {
    state: Arc<RwLock<InventoryState>>,
}

impl ReserveInventoryActivity {
    pub const NAME: &'static str = "reserve_inventory";

    /// Creates the activity with an empty reservation table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes reservations fail with `InsufficientStock`.
    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().await.fail_on_reserve = fail;
    }

    /// Makes releases fail.
    pub async fn set_fail_on_release(&self, fail: bool) {
        self.state.write().await.fail_on_release = fail;
    }

    /// Returns the number of active reservations.
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    /// Returns true if `reservation_id` is still held.
    pub async fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .await
            .reservations
            .contains_key(reservation_id)
    }

    /// Returns how many reservations were released.
    pub async fn released_count(&self) -> usize {
        self.state.read().await.released
    }
}

#[async_trait]
impl Executor for ReserveInventoryActivity {
    async fn execute(&self, context: &ExecuteContext) -> Result<ExecutionResult, ActivityError> {
        let args: ReserveInventoryArguments = context.arguments()?;
        if args.items.is_empty() {
            return Err(ActivityError::new("InvalidArguments", "no items to reserve"));
        }

        let mut state = self.state.write().await;
        if state.fail_on_reserve {
            return Err(ActivityError::new("InsufficientStock", "Insufficient stock"));
        }

        let existing = state
            .by_tracking_number
            .get(&context.tracking_number())
            .cloned();
        let reservation_id = match existing {
            Some(reservation_id) => reservation_id,
            None => {
                state.next_id += 1;
                let reservation_id = format!("RES-{:04}", state.next_id);
                state
                    .reservations
                    .insert(reservation_id.clone(), (args.order_id, args.items));
                state
                    .by_tracking_number
                    .insert(context.tracking_number(), reservation_id.clone());
                reservation_id
            }
        };

        Ok(context
            .completion()
            .with_log(&ReservationLog {
                reservation_id: reservation_id.clone(),
            })?
            .with_variable("reservation_id", &reservation_id)?
            .into())
    }
}

#[async_trait]
impl Compensator for ReserveInventoryActivity {
    async fn compensate(
        &self,
        context: &CompensateContext,
    ) -> Result<CompensationResult, ActivityError> {
        let log: ReservationLog = context.log()?;
        let mut state = self.state.write().await;
        if state.fail_on_release {
            return Err(ActivityError::new(
                "ReleaseFailed",
                format!("could not release {}", log.reservation_id),
            ));
        }

        if state.reservations.remove(&log.reservation_id).is_some() {
            state.released += 1;
        }
        state.by_tracking_number.remove(&context.tracking_number());
        Ok(context.compensated())
    }
}
