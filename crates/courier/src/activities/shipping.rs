//! Shipment creation activity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::TrackingNumber;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::activity::{CompensationResult, Compensator, ExecutionResult, Executor};
use crate::context::{CompensateContext, ExecuteContext};
use crate::error::ActivityError;

/// `payment_id` is normally supplied by the payment step's variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentArguments {
    pub order_id: String,
    pub payment_id: String,
    /// Digital orders have nothing to ship; the routing slip terminates here.
    #[serde(default)]
    pub digital: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLog {
    pub shipment_id: String,
}

#[derive(Debug, Default)]
struct ShippingState {
    shipments: HashMap<String, String>,
    by_tracking_number: HashMap<TrackingNumber, String>,
    next_id: u32,
    fail_on_create: bool,
}

/// Creates a shipment; compensation cancels it.
///
/// Sets the `shipment_id` variable.
#[derive(Debug, Clone, Default)]
pub struct CreateShipmentActivity {
    state: Arc<RwLock<ShippingState>>,
}

impl CreateShipmentActivity {
    pub const NAME: &'static str = "create_shipment";

    /// Creates the activity with no shipments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes shipment creation fail with `ShippingUnavailable`.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Returns the number of active shipments.
    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }

    /// Returns true if `shipment_id` exists and was not cancelled.
    pub async fn has_shipment(&self, shipment_id: &str) -> bool {
        self.state.read().await.shipments.contains_key(shipment_id)
    }
}

#[async_trait]
impl Executor for CreateShipmentActivity {
    async fn execute(&self, context: &ExecuteContext) -> Result<ExecutionResult, ActivityError> {
        let args: CreateShipmentArguments = context.arguments()?;
        if args.digital {
            return Ok(context.terminated("digital order, nothing to ship"));
        }

        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(ActivityError::new(
                "ShippingUnavailable",
                "Shipping unavailable",
            ));
        }

        let existing = state
            .by_tracking_number
            .get(&context.tracking_number())
            .cloned();
        let shipment_id = match existing {
            Some(shipment_id) => shipment_id,
            None => {
                state.next_id += 1;
                let shipment_id = format!("SHIP-{:04}", state.next_id);
                state
                    .shipments
                    .insert(shipment_id.clone(), args.order_id);
                state
                    .by_tracking_number
                    .insert(context.tracking_number(), shipment_id.clone());
                shipment_id
            }
        };

        tracing::debug!(%shipment_id, payment_id = %args.payment_id, "shipment created");
        Ok(context
            .completion()
            .with_log(&ShipmentLog {
                shipment_id: shipment_id.clone(),
            })?
            .with_variable("shipment_id", &shipment_id)?
            .into())
    }
}

#[async_trait]
impl Compensator for CreateShipmentActivity {
    async fn compensate(
        &self,
        context: &CompensateContext,
    ) -> Result<CompensationResult, ActivityError> {
        let log: ShipmentLog = context.log()?;
        let mut state = self.state.write().await;
        state.shipments.remove(&log.shipment_id);
        state.by_tracking_number.remove(&context.tracking_number());
        Ok(context.compensated())
    }
}
