//! Runs the activity at the head of a routing slip's itinerary.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::Utc;
use common::Address;
use futures_util::FutureExt;
use routing_slip::{
    ActivityException, ActivityLogEntry, ActivityStep, CompensateActivity, ExecuteActivity,
    ItineraryBuilder, RoutingSlip, RoutingSlipEvent, Variables,
};
use transport::SendTransport;

use crate::activity::ExecutionResult;
use crate::codec::CourierMessage;
use crate::context::ExecuteContext;
use crate::error::{CourierError, Result, panic_exception};
use crate::publisher::EventPublisher;
use crate::registry::ActivityDefinition;
use crate::stage::ExecuteStage;

/// What one execute hop decided.
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub stage: ExecuteStage,
    /// The slip as it left this host.
    pub routing_slip: RoutingSlip,
    /// Where it was sent, or `None` if the slip reached a terminal state.
    pub next_address: Option<Address>,
}

/// The execute endpoint of one activity.
pub struct ExecuteHost<T> {
    definition: ActivityDefinition,
    transport: T,
    publisher: EventPublisher<T>,
    host_name: String,
}

impl<T> ExecuteHost<T>
where
    T: SendTransport + Clone,
{
    /// Creates the execute endpoint for `definition`, sending on `transport`.
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
        &self.definition.execute_address
    }

    /// Executes the head activity and forwards the resulting slip.
    ///
    /// Activity failures are not errors: they produce a `Faulted` outcome
    /// and start compensation. Errors are protocol mismatches (the slip is
    /// not waiting for this activity) and transport failures.
    #[tracing::instrument(
        skip(self, message),
        fields(
            activity = %self.definition.name,
            tracking_number = %message.tracking_number(),
        )
    )]
    pub async fn handle(&self, message: ExecuteActivity) -> Result<ExecuteOutcome> {
        let slip = message.routing_slip;
        let step = self.validate(&slip)?;
        let mut stage = ExecuteStage::Received;

        stage = self.advance(stage, ExecuteStage::Executing);
        let context = ExecuteContext::new(
            slip.tracking_number(),
            &self.definition.name,
            step.arguments.clone(),
            slip.variables().clone(),
            &self.host_name,
        );

        let activity = self.definition.name.clone();
        metrics::counter!("courier_activity_executions_total", "activity" => activity.clone())
            .increment(1);
        let timestamp = Utc::now();
        let started = Instant::now();
        let result = match AssertUnwindSafe(self.definition.executor.execute(&context))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ExecutionResult::Faulted(e.into()),
            Err(payload) => ExecutionResult::Faulted(panic_exception(payload)),
        };
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis().try_into().unwrap_or(u64::MAX);
        metrics::histogram!("courier_activity_duration_seconds", "activity" => activity.clone())
            .record(elapsed.as_secs_f64());

        let log_entry = |compensation_data: serde_json::Value| ActivityLogEntry {
            execution_id: context.execution_id(),
            name: self.definition.name.clone(),
            compensate_address: step.compensate_address.clone(),
            compensation_data,
            timestamp,
            duration_ms,
            host: self.host_name.clone(),
        };

        let (next, next_address) = match result {
            ExecutionResult::Completed(completion) => {
                stage = self.advance(stage, ExecuteStage::Completed);
                let entry = log_entry(completion.compensation_data);
                let completed = slip.complete_head(entry.clone(), &Variables::new())?;
                let next = ItineraryBuilder::new(&completed)
                    .set_variables(&completion.variables)
                    .apply(completion.revision)
                    .build();

                let event = RoutingSlipEvent::activity_completed(&next, &entry, &step.arguments);

                // Events go out only after the forward send: a failed send is
                // redelivered and must leave no trace for subscribers.
                match next.next_address().cloned() {
                    Some(address) => {
                        self.send(&address, ExecuteActivity::new(next.clone())).await?;
                        self.publisher.publish(&next, &event).await;
                        tracing::info!(next = %address, "activity completed");
                        (next, Some(address))
                    }
                    None => {
                        self.publisher.publish(&next, &event).await;
                        self.publisher
                            .publish(&next, &RoutingSlipEvent::completed(&next))
                            .await;
                        metrics::counter!("courier_routing_slips_completed_total").increment(1);
                        tracing::info!("routing slip completed");
                        (next, None)
                    }
                }
            }
            ExecutionResult::Terminated(termination) => {
                stage = self.advance(stage, ExecuteStage::Terminated);
                let entry = log_entry(termination.compensation_data);
                let next = slip.terminate_head(entry.clone(), &termination.variables)?;

                self.publisher
                    .publish(
                        &next,
                        &RoutingSlipEvent::activity_completed(&next, &entry, &step.arguments),
                    )
                    .await;
                self.publisher
                    .publish(
                        &next,
                        &RoutingSlipEvent::terminated(&next, termination.reason.clone()),
                    )
                    .await;
                metrics::counter!("courier_routing_slips_terminated_total").increment(1);
                tracing::info!(reason = ?termination.reason, "routing slip terminated");
                (next, None)
            }
            ExecutionResult::Faulted(exception_info) => {
                stage = self.advance(stage, ExecuteStage::Faulted);
                metrics::counter!("courier_activity_faults_total", "activity" => activity)
                    .increment(1);
                tracing::warn!(
                    exception_type = %exception_info.exception_type,
                    message = %exception_info.message,
                    "activity faulted"
                );

                let exception = ActivityException {
                    execution_id: context.execution_id(),
                    name: self.definition.name.clone(),
                    timestamp,
                    host: self.host_name.clone(),
                    exception_info,
                };
                let next = slip.record_fault(exception.clone());

                let event = RoutingSlipEvent::activity_faulted(
                    &next,
                    &exception,
                    &step.arguments,
                    duration_ms,
                );

                match next.next_address().cloned() {
                    Some(address) => {
                        self.send(&address, CompensateActivity::new(next.clone()))
                            .await?;
                        self.publisher.publish(&next, &event).await;
                        tracing::info!(next = %address, "compensation started");
                        (next, Some(address))
                    }
                    None => {
                        self.publisher.publish(&next, &event).await;
                        self.publisher
                            .publish(&next, &RoutingSlipEvent::faulted(&next))
                            .await;
                        metrics::counter!("courier_routing_slips_faulted_total").increment(1);
                        tracing::info!("routing slip faulted with nothing to compensate");
                        (next, None)
                    }
                }
            }
        };

        Ok(ExecuteOutcome {
            stage,
            routing_slip: next,
            next_address,
        })
    }

    /// The slip must be moving forward with this activity at its head.
    fn validate(&self, slip: &RoutingSlip) -> Result<ActivityStep> {
        let actual = if slip.is_faulted() {
            "a faulted routing slip".to_string()
        } else {
            match slip.itinerary().first() {
                Some(step) if step.name == self.definition.name => return Ok(step.clone()),
                Some(step) => format!("'{}'", step.name),
                None => "an empty itinerary".to_string(),
            }
        };

        tracing::warn!(expected = %self.definition.name, %actual, "protocol mismatch");
        Err(CourierError::ProtocolMismatch {
            tracking_number: slip.tracking_number(),
            expected: self.definition.name.clone(),
            actual,
        })
    }

    fn advance(&self, from: ExecuteStage, to: ExecuteStage) -> ExecuteStage {
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        tracing::debug!(from = %from, to = %to, "execute stage");
        to
    }

    async fn send(&self, address: &Address, message: impl Into<CourierMessage>) -> Result<()> {
        let message = message.into().encode()?;
        self.transport.send(address, message).await?;
        Ok(())
    }
}
