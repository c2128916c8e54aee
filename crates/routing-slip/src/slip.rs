//! Routing slip data model.

use chrono::{DateTime, Utc};
use common::{Address, ExecutionId, TrackingNumber};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingSlipError};
use crate::subscription::Subscription;

/// Process-wide variables. Keys are unique; the last writer wins.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Activity arguments, opaque to the engine.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Serializes `value` into a JSON object.
///
/// `null` (e.g. `()` or `None`) becomes an empty object; any other
/// non-object value is rejected.
pub fn to_object<T: Serialize + ?Sized>(value: &T, activity: &str) -> Result<Arguments> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Arguments::new()),
        other => Err(RoutingSlipError::InvalidArguments {
            activity: activity.to_string(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// One entry of the itinerary: an activity still to be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStep {
    /// The activity name.
    pub name: String,
    /// Where to send the slip to execute this activity.
    pub execute_address: Address,
    /// Where to send the slip to undo this activity.
    pub compensate_address: Address,
    /// Arguments for this execution.
    #[serde(default)]
    pub arguments: Arguments,
}

impl ActivityStep {
    /// Creates a step with no arguments.
    pub fn new(
        name: impl Into<String>,
        execute_address: Address,
        compensate_address: Address,
    ) -> Self {
        Self {
            name: name.into(),
            execute_address,
            compensate_address,
            arguments: Arguments::new(),
        }
    }

    /// Sets the arguments from a serializable value.
    pub fn with_arguments<T: Serialize + ?Sized>(mut self, arguments: &T) -> Result<Self> {
        self.arguments = to_object(arguments, &self.name)?;
        Ok(self)
    }

    /// Sets the arguments from a raw JSON object.
    pub fn with_raw_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Proof that an activity executed, with what it needs to be undone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Identifies the execution.
    pub execution_id: ExecutionId,
    /// The activity name.
    pub name: String,
    /// Where to send the slip to undo this execution.
    pub compensate_address: Address,
    /// State the activity chose to keep for its undo step (`null` if none).
    #[serde(default)]
    pub compensation_data: serde_json::Value,
    /// When the execution started.
    pub timestamp: DateTime<Utc>,
    /// How long the execution took.
    pub duration_ms: u64,
    /// The host that executed it.
    pub host: String,
}

/// Description of a failure, safe to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// A short classification, e.g. "PaymentDeclined".
    pub exception_type: String,
    /// Human readable message.
    pub message: String,
}

impl ExceptionInfo {
    /// Creates exception info.
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.exception_type, self.message)
    }
}

/// A fault recorded against one activity execution or compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityException {
    /// The execution that failed (or whose undo failed).
    pub execution_id: ExecutionId,
    /// The activity name.
    pub name: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// The host that observed it.
    pub host: String,
    /// What went wrong.
    pub exception_info: ExceptionInfo,
}

/// What a routing slip on the wire is waiting for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction<'a> {
    /// The head of the itinerary is to be executed.
    Execute(&'a ActivityStep),
    /// The tail of the activity log is to be compensated.
    Compensate(&'a ActivityLogEntry),
    /// Nothing further; the slip has completed, terminated or been fully compensated.
    Terminal,
}

/// The unit of coordination state.
///
/// Fields are read-only; every transition returns a new slip and leaves
/// `self` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlip {
    tracking_number: TrackingNumber,
    create_timestamp: DateTime<Utc>,
    itinerary: Vec<ActivityStep>,
    activity_logs: Vec<ActivityLogEntry>,
    #[serde(default)]
    variables: Variables,
    #[serde(default)]
    activity_exceptions: Vec<ActivityException>,
    #[serde(default)]
    compensation_failures: Vec<ActivityException>,
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

impl RoutingSlip {
    pub(crate) fn new(
        tracking_number: TrackingNumber,
        itinerary: Vec<ActivityStep>,
        variables: Variables,
        subscriptions: Vec<Subscription>,
    ) -> Self {
        Self {
            tracking_number,
            create_timestamp: Utc::now(),
            itinerary,
            activity_logs: Vec::new(),
            variables,
            activity_exceptions: Vec::new(),
            compensation_failures: Vec::new(),
            subscriptions,
        }
    }

    /// Returns the tracking number, unchanged for the life of the slip.
    pub fn tracking_number(&self) -> TrackingNumber {
        self.tracking_number
    }

    /// Returns when the slip was built.
    pub fn create_timestamp(&self) -> DateTime<Utc> {
        self.create_timestamp
    }

    /// Returns the steps still to run, head first.
    pub fn itinerary(&self) -> &[ActivityStep] {
        &self.itinerary
    }

    /// Returns the completed executions, most recent last.
    pub fn activity_logs(&self) -> &[ActivityLogEntry] {
        &self.activity_logs
    }

    /// Returns the variables shared by every step.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Returns the execution faults recorded so far.
    pub fn activity_exceptions(&self) -> &[ActivityException] {
        &self.activity_exceptions
    }

    /// Returns the undos that failed during the reverse walk.
    pub fn compensation_failures(&self) -> &[ActivityException] {
        &self.compensation_failures
    }

    /// Returns the subscriptions that receive lifecycle events.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Returns true once an activity has faulted; the slip is then walking backwards.
    pub fn is_faulted(&self) -> bool {
        !self.activity_exceptions.is_empty()
    }

    /// Returns what the slip is waiting for.
    pub fn pending_action(&self) -> PendingAction<'_> {
        if self.is_faulted() {
            return self
                .activity_logs
                .last()
                .map_or(PendingAction::Terminal, PendingAction::Compensate);
        }
        self.itinerary
            .first()
            .map_or(PendingAction::Terminal, PendingAction::Execute)
    }

    /// Returns the address the slip should be sent to next, if any.
    pub fn next_address(&self) -> Option<&Address> {
        match self.pending_action() {
            PendingAction::Execute(step) => Some(&step.execute_address),
            PendingAction::Compensate(entry) => Some(&entry.compensate_address),
            PendingAction::Terminal => None,
        }
    }

    /// Milliseconds elapsed between slip creation and `now`.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.create_timestamp)
            .num_milliseconds()
            .try_into()
            .unwrap_or(0)
    }

    /// Moves the itinerary head into the activity log and merges `variables`.
    pub fn complete_head(&self, entry: ActivityLogEntry, variables: &Variables) -> Result<Self> {
        if self.itinerary.is_empty() {
            return Err(RoutingSlipError::EmptyItinerary);
        }
        let mut next = self.clone();
        next.itinerary.remove(0);
        next.activity_logs.push(entry);
        merge_variables(&mut next.variables, variables);
        Ok(next)
    }

    /// Like [`complete_head`](Self::complete_head) but also discards the rest of the itinerary.
    pub fn terminate_head(&self, entry: ActivityLogEntry, variables: &Variables) -> Result<Self> {
        let mut next = self.complete_head(entry, variables)?;
        next.itinerary.clear();
        Ok(next)
    }

    /// Records an execution fault. The itinerary is left where it was.
    pub fn record_fault(&self, exception: ActivityException) -> Self {
        let mut next = self.clone();
        next.activity_exceptions.push(exception);
        next
    }

    /// Removes the activity log tail after a successful undo and merges `variables`.
    pub fn compensate_tail(&self, variables: &Variables) -> Result<Self> {
        if self.activity_logs.is_empty() {
            return Err(RoutingSlipError::EmptyActivityLog);
        }
        let mut next = self.clone();
        next.activity_logs.pop();
        merge_variables(&mut next.variables, variables);
        Ok(next)
    }

    /// Removes the activity log tail after a failed undo, recording the failure.
    pub fn fail_compensation_tail(&self, exception: ActivityException) -> Result<Self> {
        if self.activity_logs.is_empty() {
            return Err(RoutingSlipError::EmptyActivityLog);
        }
        let mut next = self.clone();
        next.activity_logs.pop();
        next.compensation_failures.push(exception);
        Ok(next)
    }

    pub(crate) fn revise(
        &self,
        insert_next: &[ActivityStep],
        append: &[ActivityStep],
        subscriptions: &[Subscription],
        variables: &Variables,
    ) -> Self {
        let mut next = self.clone();
        next.itinerary = insert_next
            .iter()
            .chain(self.itinerary.iter())
            .chain(append.iter())
            .cloned()
            .collect();
        for subscription in subscriptions {
            if !next.subscriptions.contains(subscription) {
                next.subscriptions.push(subscription.clone());
            }
        }
        merge_variables(&mut next.variables, variables);
        next
    }
}

fn merge_variables(target: &mut Variables, source: &Variables) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}
