//! Routing slip lifecycle events.

use chrono::{DateTime, Utc};
use common::{ExecutionId, TrackingNumber};
use serde::{Deserialize, Serialize};

use crate::slip::{
    ActivityException, ActivityLogEntry, Arguments, ExceptionInfo, RoutingSlip, Variables,
};
use crate::subscription::RoutingSlipEventKind;

/// Events published to a routing slip's subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RoutingSlipEvent {
    /// Every activity ran.
    Completed(RoutingSlipCompleted),

    /// An activity faulted and the executed activities were walked back.
    Faulted(RoutingSlipFaulted),

    /// An activity ended the routing slip early.
    Terminated(RoutingSlipTerminated),

    /// An activity executed successfully.
    ActivityCompleted(RoutingSlipActivityCompleted),

    /// An activity faulted.
    ActivityFaulted(RoutingSlipActivityFaulted),

    /// An activity was compensated.
    ActivityCompensated(RoutingSlipActivityCompensated),

    /// An activity's compensation failed (the walk continues).
    CompensationFailed(RoutingSlipActivityCompensationFailed),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipCompleted {
    pub tracking_number: TrackingNumber,
    pub timestamp: DateTime<Utc>,
    /// Time since the slip was created.
    pub duration_ms: u64,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipFaulted {
    pub tracking_number: TrackingNumber,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// The execution faults, oldest first.
    pub activity_exceptions: Vec<ActivityException>,
    /// Undo steps that failed; empty when every executed activity was compensated.
    pub compensation_failures: Vec<ActivityException>,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipTerminated {
    pub tracking_number: TrackingNumber,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub variables: Variables,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipActivityCompleted {
    pub tracking_number: TrackingNumber,
    pub execution_id: ExecutionId,
    pub activity_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub arguments: Arguments,
    /// The compensation data the activity logged.
    pub data: serde_json::Value,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipActivityFaulted {
    pub tracking_number: TrackingNumber,
    pub execution_id: ExecutionId,
    pub activity_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub exception_info: ExceptionInfo,
    pub arguments: Arguments,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipActivityCompensated {
    pub tracking_number: TrackingNumber,
    /// The execution that was undone.
    pub execution_id: ExecutionId,
    pub activity_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub data: serde_json::Value,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSlipActivityCompensationFailed {
    pub tracking_number: TrackingNumber,
    pub execution_id: ExecutionId,
    pub activity_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub exception_info: ExceptionInfo,
    pub data: serde_json::Value,
}

impl RoutingSlipEvent {
    /// Returns which lifecycle event this is.
    pub fn kind(&self) -> RoutingSlipEventKind {
        match self {
            RoutingSlipEvent::Completed(_) => RoutingSlipEventKind::Completed,
            RoutingSlipEvent::Faulted(_) => RoutingSlipEventKind::Faulted,
            RoutingSlipEvent::Terminated(_) => RoutingSlipEventKind::Terminated,
            RoutingSlipEvent::ActivityCompleted(_) => RoutingSlipEventKind::ActivityCompleted,
            RoutingSlipEvent::ActivityFaulted(_) => RoutingSlipEventKind::ActivityFaulted,
            RoutingSlipEvent::ActivityCompensated(_) => RoutingSlipEventKind::ActivityCompensated,
            RoutingSlipEvent::CompensationFailed(_) => RoutingSlipEventKind::CompensationFailed,
        }
    }

    /// Returns the tracking number of the slip the event is about.
    pub fn tracking_number(&self) -> TrackingNumber {
        match self {
            RoutingSlipEvent::Completed(e) => e.tracking_number,
            RoutingSlipEvent::Faulted(e) => e.tracking_number,
            RoutingSlipEvent::Terminated(e) => e.tracking_number,
            RoutingSlipEvent::ActivityCompleted(e) => e.tracking_number,
            RoutingSlipEvent::ActivityFaulted(e) => e.tracking_number,
            RoutingSlipEvent::ActivityCompensated(e) => e.tracking_number,
            RoutingSlipEvent::CompensationFailed(e) => e.tracking_number,
        }
    }

    /// Returns when the event happened.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RoutingSlipEvent::Completed(e) => e.timestamp,
            RoutingSlipEvent::Faulted(e) => e.timestamp,
            RoutingSlipEvent::Terminated(e) => e.timestamp,
            RoutingSlipEvent::ActivityCompleted(e) => e.timestamp,
            RoutingSlipEvent::ActivityFaulted(e) => e.timestamp,
            RoutingSlipEvent::ActivityCompensated(e) => e.timestamp,
            RoutingSlipEvent::CompensationFailed(e) => e.timestamp,
        }
    }

    /// For activity events, how long the step took; otherwise the slip's age.
    pub fn duration_ms(&self) -> u64 {
        match self {
            RoutingSlipEvent::Completed(e) => e.duration_ms,
            RoutingSlipEvent::Faulted(e) => e.duration_ms,
            RoutingSlipEvent::Terminated(e) => e.duration_ms,
            RoutingSlipEvent::ActivityCompleted(e) => e.duration_ms,
            RoutingSlipEvent::ActivityFaulted(e) => e.duration_ms,
            RoutingSlipEvent::ActivityCompensated(e) => e.duration_ms,
            RoutingSlipEvent::CompensationFailed(e) => e.duration_ms,
        }
    }

    /// The activity an activity-level event is about.
    pub fn activity_name(&self) -> Option<&str> {
        match self {
            RoutingSlipEvent::ActivityCompleted(e) => Some(&e.activity_name),
            RoutingSlipEvent::ActivityFaulted(e) => Some(&e.activity_name),
            RoutingSlipEvent::ActivityCompensated(e) => Some(&e.activity_name),
            RoutingSlipEvent::CompensationFailed(e) => Some(&e.activity_name),
            RoutingSlipEvent::Completed(_)
            | RoutingSlipEvent::Faulted(_)
            | RoutingSlipEvent::Terminated(_) => None,
        }
    }
}

// Convenience constructors
impl RoutingSlipEvent {
    /// Creates a Completed event for a slip whose itinerary is exhausted.
    pub fn completed(slip: &RoutingSlip) -> Self {
        let timestamp = Utc::now();
        RoutingSlipEvent::Completed(RoutingSlipCompleted {
            tracking_number: slip.tracking_number(),
            timestamp,
            duration_ms: slip.elapsed_ms(timestamp),
            variables: slip.variables().clone(),
        })
    }

    /// Creates a Faulted event from a slip that has finished compensating.
    pub fn faulted(slip: &RoutingSlip) -> Self {
        let timestamp = Utc::now();
        RoutingSlipEvent::Faulted(RoutingSlipFaulted {
            tracking_number: slip.tracking_number(),
            timestamp,
            duration_ms: slip.elapsed_ms(timestamp),
            activity_exceptions: slip.activity_exceptions().to_vec(),
            compensation_failures: slip.compensation_failures().to_vec(),
            variables: slip.variables().clone(),
        })
    }

    /// Creates a Terminated event.
    pub fn terminated(slip: &RoutingSlip, reason: Option<String>) -> Self {
        let timestamp = Utc::now();
        RoutingSlipEvent::Terminated(RoutingSlipTerminated {
            tracking_number: slip.tracking_number(),
            timestamp,
            duration_ms: slip.elapsed_ms(timestamp),
            variables: slip.variables().clone(),
            reason,
        })
    }

    /// Creates an ActivityCompleted event from the slip produced by the execution.
    pub fn activity_completed(
        slip: &RoutingSlip,
        entry: &ActivityLogEntry,
        arguments: &Arguments,
    ) -> Self {
        RoutingSlipEvent::ActivityCompleted(RoutingSlipActivityCompleted {
            tracking_number: slip.tracking_number(),
            execution_id: entry.execution_id,
            activity_name: entry.name.clone(),
            timestamp: entry.timestamp,
            duration_ms: entry.duration_ms,
            arguments: arguments.clone(),
            data: entry.compensation_data.clone(),
            variables: slip.variables().clone(),
        })
    }

    /// Creates an ActivityFaulted event.
    pub fn activity_faulted(
        slip: &RoutingSlip,
        exception: &ActivityException,
        arguments: &Arguments,
        duration_ms: u64,
    ) -> Self {
        RoutingSlipEvent::ActivityFaulted(RoutingSlipActivityFaulted {
            tracking_number: slip.tracking_number(),
            execution_id: exception.execution_id,
            activity_name: exception.name.clone(),
            timestamp: exception.timestamp,
            duration_ms,
            exception_info: exception.exception_info.clone(),
            arguments: arguments.clone(),
            variables: slip.variables().clone(),
        })
    }

    /// Creates an ActivityCompensated event from the slip produced by the compensation.
    pub fn activity_compensated(
        slip: &RoutingSlip,
        entry: &ActivityLogEntry,
        duration_ms: u64,
    ) -> Self {
        RoutingSlipEvent::ActivityCompensated(RoutingSlipActivityCompensated {
            tracking_number: slip.tracking_number(),
            execution_id: entry.execution_id,
            activity_name: entry.name.clone(),
            timestamp: Utc::now(),
            duration_ms,
            data: entry.compensation_data.clone(),
            variables: slip.variables().clone(),
        })
    }

    /// Creates a CompensationFailed event.
    pub fn compensation_failed(
        slip: &RoutingSlip,
        entry: &ActivityLogEntry,
        exception: &ActivityException,
        duration_ms: u64,
    ) -> Self {
        RoutingSlipEvent::CompensationFailed(RoutingSlipActivityCompensationFailed {
            tracking_number: slip.tracking_number(),
            execution_id: entry.execution_id,
            activity_name: entry.name.clone(),
            timestamp: exception.timestamp,
            duration_ms,
            exception_info: exception.exception_info.clone(),
            data: entry.compensation_data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RoutingSlipBuilder;
    use crate::slip::ActivityStep;
    use common::Address;
    use serde_json::json;

    fn slip() -> RoutingSlip {
        RoutingSlipBuilder::new()
            .add_activity(ActivityStep::new(
                "reserve_inventory",
                Address::new("queue:reserve_inventory_execute"),
                Address::new("queue:reserve_inventory_compensate"),
            ))
            .add_variable("order_id", "ORD-7")
            .unwrap()
            .build()
            .unwrap()
    }

    fn entry() -> ActivityLogEntry {
        ActivityLogEntry {
            execution_id: ExecutionId::new(),
            name: "reserve_inventory".to_string(),
            compensate_address: Address::new("queue:reserve_inventory_compensate"),
            compensation_data: json!({"reservation_id": "RES-0001"}),
            timestamp: Utc::now(),
            duration_ms: 12,
            host: "test-host".to_string(),
        }
    }

    fn exception() -> ActivityException {
        ActivityException {
            execution_id: ExecutionId::new(),
            name: "process_payment".to_string(),
            timestamp: Utc::now(),
            host: "test-host".to_string(),
            exception_info: ExceptionInfo::new("PaymentDeclined", "card declined"),
        }
    }

    #[test]
    fn test_kind_and_activity_name() {
        let slip = slip();
        let entry = entry();
        let exception = exception();

        let cases = [
            (RoutingSlipEvent::completed(&slip), RoutingSlipEventKind::Completed, None),
            (RoutingSlipEvent::faulted(&slip), RoutingSlipEventKind::Faulted, None),
            (
                RoutingSlipEvent::terminated(&slip, Some("cancelled".into())),
                RoutingSlipEventKind::Terminated,
                None,
            ),
            (
                RoutingSlipEvent::activity_completed(&slip, &entry, &Arguments::new()),
                RoutingSlipEventKind::ActivityCompleted,
                Some("reserve_inventory"),
            ),
            (
                RoutingSlipEvent::activity_faulted(&slip, &exception, &Arguments::new(), 5),
                RoutingSlipEventKind::ActivityFaulted,
                Some("process_payment"),
            ),
            (
                RoutingSlipEvent::activity_compensated(&slip, &entry, 2),
                RoutingSlipEventKind::ActivityCompensated,
                Some("reserve_inventory"),
            ),
            (
                RoutingSlipEvent::compensation_failed(&slip, &entry, &exception, 2),
                RoutingSlipEventKind::CompensationFailed,
                Some("reserve_inventory"),
            ),
        ];

        for (event, kind, activity) in cases {
            assert_eq!(event.kind(), kind);
            assert_eq!(event.activity_name(), activity);
            assert_eq!(event.tracking_number(), slip.tracking_number());
        }
    }

    #[test]
    fn test_completed_carries_variables() {
        let slip = slip();
        if let RoutingSlipEvent::Completed(data) = RoutingSlipEvent::completed(&slip) {
            assert_eq!(data.variables["order_id"], "ORD-7");
        } else {
            panic!("Expected Completed event");
        }
    }

    #[test]
    fn test_faulted_carries_exceptions() {
        let slip = slip().record_fault(exception());
        let event = RoutingSlipEvent::faulted(&slip);

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: RoutingSlipEvent = serde_json::from_str(&json).unwrap();

        if let RoutingSlipEvent::Faulted(data) = deserialized {
            assert_eq!(data.activity_exceptions.len(), 1);
            assert_eq!(
                data.activity_exceptions[0].exception_info.exception_type,
                "PaymentDeclined"
            );
            assert!(data.compensation_failures.is_empty());
        } else {
            panic!("Expected Faulted event");
        }
    }

    #[test]
    fn test_adjacently_tagged_wire_form() {
        let event = RoutingSlipEvent::activity_compensated(&slip(), &entry(), 1);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ActivityCompensated");
        assert_eq!(value["data"]["activity_name"], "reserve_inventory");
        assert_eq!(value["data"]["data"]["reservation_id"], "RES-0001");
    }
}
