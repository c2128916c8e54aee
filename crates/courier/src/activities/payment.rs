//! Payment activity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::TrackingNumber;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::activity::{CompensationResult, Compensator, ExecutionResult, Executor};
use crate::context::{CompensateContext, ExecuteContext};
use crate::error::ActivityError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPaymentArguments {
    pub order_id: String,
    pub amount_cents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLog {
    pub payment_id: String,
    pub amount_cents: u64,
}

#[derive(Debug, Default)]
struct PaymentState {
    payments: HashMap<String, (String, u64)>,
    by_tracking_number: HashMap<TrackingNumber, String>,
    next_id: u32,
    refunded_cents: u64,
    fail_on_charge: bool,
    fail_on_refund: bool,
}

/// Charges an order; compensation refunds the charge.
///
/// Sets the `payment_id` variable.
#[derive(Debug, Clone, Default)]
pub struct ProcessPaymentActivity {
    state: Arc<RwLock<PaymentState>>,
}

impl ProcessPaymentActivity {
    pub const NAME: &'static str = "process_payment";

    /// Creates the activity with no payments recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes charges fail with `PaymentDeclined`.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Makes refunds fail.
    pub async fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().await.fail_on_refund = fail;
    }

    /// Returns the number of payments not refunded.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// Returns true if `payment_id` has been charged and not refunded.
    pub async fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().await.payments.contains_key(payment_id)
    }

    /// Total amount refunded so far.
    pub async fn refunded_cents(&self) -> u64 {
        self.state.read().await.refunded_cents
    }
}

#[async_trait]
impl Executor for ProcessPaymentActivity {
    async fn execute(&self, context: &ExecuteContext) -> Result<ExecutionResult, ActivityError> {
        let args: ProcessPaymentArguments = context.arguments()?;
        if args.amount_cents == 0 {
            return Err(ActivityError::new(
                "InvalidArguments",
                "amount must be greater than zero",
            ));
        }

        let mut state = self.state.write().await;
        if state.fail_on_charge {
            return Ok(context.faulted(ActivityError::new("PaymentDeclined", "Payment declined")));
        }

        let existing = state
            .by_tracking_number
            .get(&context.tracking_number())
            .cloned();
        let payment_id = match existing {
            Some(payment_id) => payment_id,
            None => {
                state.next_id += 1;
                let payment_id = format!("PAY-{:04}", state.next_id);
                state
                    .payments
                    .insert(payment_id.clone(), (args.order_id, args.amount_cents));
                state
                    .by_tracking_number
                    .insert(context.tracking_number(), payment_id.clone());
                payment_id
            }
        };

        Ok(context
            .completion()
            .with_log(&PaymentLog {
                payment_id: payment_id.clone(),
                amount_cents: args.amount_cents,
            })?
            .with_variable("payment_id", &payment_id)?
            .into())
    }
}

#[async_trait]
impl Compensator for ProcessPaymentActivity {
    async fn compensate(
        &self,
        context: &CompensateContext,
    ) -> Result<CompensationResult, ActivityError> {
        let log: PaymentLog = context.log()?;
        let mut state = self.state.write().await;
        if state.fail_on_refund {
            return Ok(context.failed(ActivityError::new(
                "RefundFailed",
                format!("could not refund {}", log.payment_id),
            )));
        }

        if state.payments.remove(&log.payment_id).is_some() {
            state.refunded_cents += log.amount_cents;
        }
        state.by_tracking_number.remove(&context.tracking_number());
        Ok(context.compensated())
    }
}
