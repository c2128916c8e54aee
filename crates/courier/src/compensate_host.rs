//! Undoes the most recently completed activity of a faulted routing slip.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::Utc;
use common::Address;
use futures_util::FutureExt;
use routing_slip::{
    ActivityException, ActivityLogEntry, CompensateActivity, RoutingSlip, RoutingSlipEvent,
};
use transport::SendTransport;

use crate::activity::CompensationResult;
use crate::codec::CourierMessage;
use crate::context::CompensateContext;
use crate::error::{CourierError, Result, panic_exception};
use crate::publisher::EventPublisher;
use crate::registry::ActivityDefinition;
use crate::stage::CompensateStage;

/// What one compensate hop decided.
#[derive(Debug, Clone)]
pub struct CompensateOutcome {
    pub stage: CompensateStage,
    pub routing_slip: RoutingSlip,
    /// The previous activity's compensate address, or `None` once the log is empty.
    pub next_address: Option<Address>,
}

/// The compensate endpoint of one activity.
///
/// Compensation is best-effort: a failed undo is reported and recorded on
/// the slip, and the walk continues with the previous log entry.
pub struct CompensateHost<T> {
    definition: ActivityDefinition,
    transport: T,
    publisher: EventPublisher<T>,
    host_name: String,
}

impl<T> CompensateHost<T>
where
    T: SendTransport + Clone,
{
    /// Creates the compensate endpoint for `definition`, sending on `transport`.
    pub fn new(definition: ActivityDefinition, transport: T, host_name: impl Into<String>) -> Self {
        Self {
            definition,
            publisher: EventPublisher::new(transport.clone()),
            transport,
            host_name: host_name.into(),
        }
    }

    /// Returns the hosted activity's name.
    pub fn activity_name(&self) -> &str {
        &self.definition.name
    }

    /// Returns the address this host receives on.
    pub fn address(&self) -> &Address {
        &self.definition.compensate_address
    }

    /// Compensates the log tail and forwards the slip backwards.
    #[tracing::instrument(
        skip(self, message),
        fields(
            activity = %self.definition.name,
            tracking_number = %message.tracking_number(),
        )
    )]
    pub async fn handle(&self, message: CompensateActivity) -> Result<CompensateOutcome> {
        let slip = message.routing_slip;
        let entry = self.validate(&slip)?;
        let mut stage = self.advance(CompensateStage::Received, CompensateStage::Compensating);

        let context = CompensateContext::new(
            slip.tracking_number(),
            entry.execution_id,
            &entry.name,
            entry.compensation_data.clone(),
            slip.variables().clone(),
        );

        let activity = self.definition.name.clone();
        metrics::counter!("courier_compensations_total", "activity" => activity.clone())
            .increment(1);
        let started = Instant::now();
        let result = match AssertUnwindSafe(self.definition.compensator.compensate(&context))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => CompensationResult::Failed(e.into()),
            Err(payload) => CompensationResult::Failed(panic_exception(payload)),
        };
        let duration_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

        let (next, event) = match result {
            CompensationResult::Compensated { variables } => {
                stage = self.advance(stage, CompensateStage::Compensated);
                let next = slip.compensate_tail(&variables)?;
                let event = RoutingSlipEvent::activity_compensated(&next, &entry, duration_ms);
                tracing::info!("activity compensated");
                (next, event)
            }
            CompensationResult::Failed(exception_info) => {
                stage = self.advance(stage, CompensateStage::CompensationFailed);
                metrics::counter!("courier_compensation_failures_total", "activity" => activity)
                    .increment(1);
                tracing::warn!(
                    exception_type = %exception_info.exception_type,
                    message = %exception_info.message,
                    "compensation failed, continuing"
                );

                let exception = ActivityException {
                    execution_id: entry.execution_id,
                    name: entry.name.clone(),
                    timestamp: Utc::now(),
                    host: self.host_name.clone(),
                    exception_info,
                };
                let next = slip.fail_compensation_tail(exception.clone())?;
                let event =
                    RoutingSlipEvent::compensation_failed(&next, &entry, &exception, duration_ms);
                (next, event)
            }
        };

        // Publish after the backward send so a redelivered hop reports once.
        let next_address = next.next_address().cloned();
        match &next_address {
            Some(address) => {
                let message =
                    CourierMessage::from(CompensateActivity::new(next.clone())).encode()?;
                self.transport.send(address, message).await?;
                self.publisher.publish(&next, &event).await;
                tracing::debug!(next = %address, "compensation forwarded");
            }
            None => {
                self.publisher.publish(&next, &event).await;
                self.publisher
                    .publish(&next, &RoutingSlipEvent::faulted(&next))
                    .await;
                metrics::counter!("courier_routing_slips_faulted_total").increment(1);
                tracing::info!(
                    compensation_failures = next.compensation_failures().len(),
                    "routing slip faulted"
                );
            }
        }

        Ok(CompensateOutcome {
            stage,
            routing_slip: next,
            next_address,
        })
    }

    /// The slip must be walking backwards with this activity at the log tail.
    fn validate(&self, slip: &RoutingSlip) -> Result<ActivityLogEntry> {
        let actual = if !slip.is_faulted() {
            "a routing slip that has not faulted".to_string()
        } else {
            match slip.activity_logs().last() {
                Some(entry) if entry.name == self.definition.name => return Ok(entry.clone()),
                Some(entry) => format!("'{}'", entry.name),
                None => "an empty activity log".to_string(),
            }
        };

        tracing::warn!(expected = %self.definition.name, %actual, "protocol mismatch");
        Err(CourierError::ProtocolMismatch {
            tracking_number: slip.tracking_number(),
            expected: self.definition.name.clone(),
            actual,
        })
    }

    fn advance(&self, from: CompensateStage, to: CompensateStage) -> CompensateStage {
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        tracing::debug!(from = %from, to = %to, "compensate stage");
        to
    }
}
