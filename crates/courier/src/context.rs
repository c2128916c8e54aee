//! Per-invocation contexts handed to activities.

use common::{ExecutionId, TrackingNumber};
use routing_slip::{Arguments, ExceptionInfo, Variables};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::activity::{CompensationResult, Completion, ExecutionResult, Termination};
use crate::error::ActivityError;

/// What an executing activity can see, plus constructors for its result.
#[derive(Debug, Clone)]
pub struct ExecuteContext {
    tracking_number: TrackingNumber,
    execution_id: ExecutionId,
    activity_name: String,
    arguments: Arguments,
    variables: Variables,
    host: String,
}

impl ExecuteContext {
    /// Creates a context for one execution, with a fresh execution id.
    pub fn new(
        tracking_number: TrackingNumber,
        activity_name: impl Into<String>,
        arguments: Arguments,
        variables: Variables,
        host: impl Into<String>,
    ) -> Self {
        Self {
            tracking_number,
            execution_id: ExecutionId::new(),
            activity_name: activity_name.into(),
            arguments,
            variables,
            host: host.into(),
        }
    }

    /// Returns the tracking number of the slip being executed.
    pub fn tracking_number(&self) -> TrackingNumber {
        self.tracking_number
    }

    /// Returns the id of this execution.
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the name of the executing activity.
    pub fn activity_name(&self) -> &str {
        &self.activity_name
    }

    /// Returns the name of the host running the activity.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The step's arguments exactly as they appear on the slip.
    pub fn raw_arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Returns the slip variables as they were when the hop arrived.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Deserializes the arguments into `T`.
    ///
    /// Keys missing from the arguments are filled from the slip's variables,
    /// so a later step can consume what an earlier step produced.
    pub fn arguments<T: DeserializeOwned>(&self) -> Result<T, ActivityError> {
        let mut merged = self.variables.clone();
        for (key, value) in &self.arguments {
            merged.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(serde_json::Value::Object(merged))?)
    }

    /// Reads a single variable, if present.
    pub fn variable<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ActivityError> {
        self.variables
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(ActivityError::from)
    }

    /// Completed with nothing to undo.
    pub fn completed(&self) -> ExecutionResult {
        ExecutionResult::Completed(Completion::new())
    }

    /// Completed, setting variables on the slip.
    pub fn completed_with_variables(&self, variables: Variables) -> ExecutionResult {
        ExecutionResult::Completed(Completion::new().with_variables(variables))
    }

    /// Completed, recording `data` for the compensate step.
    pub fn completed_with_log<T: Serialize + ?Sized>(
        &self,
        data: &T,
    ) -> Result<ExecutionResult, ActivityError> {
        Ok(ExecutionResult::Completed(Completion::new().with_log(data)?))
    }

    /// Starts a completion that also revises the itinerary or subscriptions.
    pub fn completion(&self) -> Completion {
        Completion::new()
    }

    /// The activity failed; compensation starts from the previous step.
    pub fn faulted(&self, error: impl Into<ExceptionInfo>) -> ExecutionResult {
        ExecutionResult::Faulted(error.into())
    }

    /// Completed, and the rest of the itinerary is skipped.
    pub fn terminated(&self, reason: impl Into<String>) -> ExecutionResult {
        ExecutionResult::Terminated(Termination {
            reason: Some(reason.into()),
            ..Termination::default()
        })
    }
}

/// What a compensating activity can see, plus constructors for its result.
#[derive(Debug, Clone)]
pub struct CompensateContext {
    tracking_number: TrackingNumber,
    execution_id: ExecutionId,
    activity_name: String,
    compensation_data: serde_json::Value,
    variables: Variables,
}

impl CompensateContext {
    /// Creates a context for undoing the execution `execution_id`.
    pub fn new(
        tracking_number: TrackingNumber,
        execution_id: ExecutionId,
        activity_name: impl Into<String>,
        compensation_data: serde_json::Value,
        variables: Variables,
    ) -> Self {
        Self {
            tracking_number,
            execution_id,
            activity_name: activity_name.into(),
            compensation_data,
            variables,
        }
    }

    /// Returns the tracking number of the slip being compensated.
    pub fn tracking_number(&self) -> TrackingNumber {
        self.tracking_number
    }

    /// Id of the execution being undone.
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the name of the activity being undone.
    pub fn activity_name(&self) -> &str {
        &self.activity_name
    }

    /// Returns the data the activity logged when it ran.
    pub fn compensation_data(&self) -> &serde_json::Value {
        &self.compensation_data
    }

    /// Deserializes the compensation data into `T`.
    pub fn log<T: DeserializeOwned>(&self) -> Result<T, ActivityError> {
        Ok(serde_json::from_value(self.compensation_data.clone())?)
    }

    /// Returns the slip variables as they were when the hop arrived.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// The undo succeeded and changes no variables.
    pub fn compensated(&self) -> CompensationResult {
        CompensationResult::Compensated {
            variables: Variables::new(),
        }
    }

    /// The undo succeeded; `variables` are merged into the slip.
    pub fn compensated_with_variables(&self, variables: Variables) -> CompensationResult {
        CompensationResult::Compensated { variables }
    }

    /// The undo failed. The reverse walk still continues.
    pub fn failed(&self, error: impl Into<ExceptionInfo>) -> CompensationResult {
        CompensationResult::Failed(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct ChargeArgs {
        order_id: String,
        amount_cents: u64,
    }

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn execute_context(arguments: serde_json::Value, variables: serde_json::Value) -> ExecuteContext {
        ExecuteContext::new(
            TrackingNumber::new(),
            "process_payment",
            object(arguments),
            object(variables),
            "test-host",
        )
    }

    #[test]
    fn arguments_fall_back_to_variables() {
        let context = execute_context(
            json!({"amount_cents": 4500}),
            json!({"order_id": "ORD-1", "amount_cents": 1}),
        );
        let args: ChargeArgs = context.arguments().unwrap();
        assert_eq!(args.order_id, "ORD-1");
        // Arguments win over variables.
        assert_eq!(args.amount_cents, 4500);
    }

    #[test]
    fn missing_arguments_are_invalid() {
        let context = execute_context(json!({"amount_cents": 4500}), json!({}));
        let err = context.arguments::<ChargeArgs>().unwrap_err();
        assert_eq!(err.kind, "InvalidArguments");
    }

    #[test]
    fn variable_lookup() {
        let context = execute_context(json!({}), json!({"reservation_id": "RES-0001"}));
        let found: Option<String> = context.variable("reservation_id").unwrap();
        let missing: Option<String> = context.variable("payment_id").unwrap();
        assert_eq!(found.as_deref(), Some("RES-0001"));
        assert!(missing.is_none());
    }

    #[test]
    fn result_constructors() {
        let context = execute_context(json!({}), json!({}));

        assert!(matches!(context.completed(), ExecutionResult::Completed(_)));
        match context.completed_with_log(&json!({"payment_id": "PAY-0001"})).unwrap() {
            ExecutionResult::Completed(completion) => {
                assert_eq!(completion.compensation_data["payment_id"], "PAY-0001")
            }
            other => panic!("unexpected {other:?}"),
        }
        match context.faulted(ActivityError::new("PaymentDeclined", "card declined")) {
            ExecutionResult::Faulted(info) => assert_eq!(info.exception_type, "PaymentDeclined"),
            other => panic!("unexpected {other:?}"),
        }
        match context.terminated("already shipped") {
            ExecutionResult::Terminated(termination) => {
                assert_eq!(termination.reason.as_deref(), Some("already shipped"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compensate_context_reads_log() {
        #[derive(Deserialize)]
        struct PaymentLog {
            payment_id: String,
        }

        let context = CompensateContext::new(
            TrackingNumber::new(),
            ExecutionId::new(),
            "process_payment",
            json!({"payment_id": "PAY-0007"}),
            Variables::new(),
        );
        let log: PaymentLog = context.log().unwrap();
        assert_eq!(log.payment_id, "PAY-0007");
        assert!(matches!(
            context.failed(ActivityError::new("RefundFailed", "gateway down")),
            CompensationResult::Failed(_)
        ));
    }
}
