//! Activity contracts and their outcomes.

use async_trait::async_trait;
use routing_slip::{ActivityStep, ExceptionInfo, ItineraryRevision, Subscription, Variables};
use serde::Serialize;

use crate::context::{CompensateContext, ExecuteContext};
use crate::error::ActivityError;

/// The execute half of an activity.
///
/// Returning `Err` is the same as returning [`ExecutionResult::Faulted`]:
/// both start the compensation walk. Executions may be delivered more than
/// once; implementations should be idempotent per tracking number.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, context: &ExecuteContext) -> Result<ExecutionResult, ActivityError>;
}

/// The undo half of an activity.
///
/// Returning `Err` is the same as returning [`CompensationResult::Failed`].
#[async_trait]
pub trait Compensator: Send + Sync {
    async fn compensate(
        &self,
        context: &CompensateContext,
    ) -> Result<CompensationResult, ActivityError>;
}

/// Compensator for activities that have nothing to undo.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompensation;

#[async_trait]
impl Compensator for NoCompensation {
    async fn compensate(
        &self,
        context: &CompensateContext,
    ) -> Result<CompensationResult, ActivityError> {
        Ok(context.compensated())
    }
}

/// Outcome of an execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// The activity succeeded; the slip moves on.
    Completed(Completion),
    /// The activity failed; previously completed activities are compensated.
    Faulted(ExceptionInfo),
    /// The activity succeeded and the slip ends here, skipping the rest of the itinerary.
    Terminated(Termination),
}

/// A successful execution and everything it adds to the routing slip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// What the compensate step will need (`null` when nothing).
    pub compensation_data: serde_json::Value,
    /// Variables to set on the slip.
    pub variables: Variables,
    /// Steps and subscriptions to add.
    pub revision: ItineraryRevision,
}

impl Completion {
    /// Starts an empty completion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records data for the compensate step.
    pub fn with_log<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self, ActivityError> {
        self.compensation_data = serde_json::to_value(data)?;
        Ok(self)
    }

    /// Sets one variable.
    pub fn with_variable<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, ActivityError> {
        self.variables
            .insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Sets several variables.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Runs `step` right after this activity.
    pub fn insert_next(mut self, step: ActivityStep) -> Self {
        self.revision.insert_next.push(step);
        self
    }

    /// Runs `step` after the rest of the itinerary.
    pub fn append(mut self, step: ActivityStep) -> Self {
        self.revision.append.push(step);
        self
    }

    /// Adds a subscription to the slip.
    pub fn add_subscription(mut self, subscription: Subscription) -> Self {
        self.revision.subscriptions.push(subscription);
        self
    }
}

impl From<Completion> for ExecutionResult {
    fn from(completion: Completion) -> Self {
        ExecutionResult::Completed(completion)
    }
}

/// A successful execution that ends the routing slip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Termination {
    pub compensation_data: serde_json::Value,
    pub variables: Variables,
    pub reason: Option<String>,
}

/// Outcome of a compensation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompensationResult {
    /// The execution was undone; variables are merged into the slip.
    Compensated { variables: Variables },
    /// The undo failed. The walk continues regardless.
    Failed(ExceptionInfo),
}
