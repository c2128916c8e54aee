//! Wire messages exchanged between activity hosts.

use common::TrackingNumber;
use serde::{Deserialize, Serialize};

use crate::slip::{ActivityLogEntry, ActivityStep, Arguments, RoutingSlip, Variables};

/// Asks the activity at the head of the itinerary to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteActivity {
    pub routing_slip: RoutingSlip,
}

impl ExecuteActivity {
    /// Contract name used as the transport message type.
    pub const MESSAGE_TYPE: &'static str = "ExecuteActivity";

    /// Wraps a slip headed for its next execute address.
    pub fn new(routing_slip: RoutingSlip) -> Self {
        Self { routing_slip }
    }

    /// Returns the slip's tracking number.
    pub fn tracking_number(&self) -> TrackingNumber {
        self.routing_slip.tracking_number()
    }

    /// Returns the steps still to run, including the one about to execute.
    pub fn itinerary(&self) -> &[ActivityStep] {
        self.routing_slip.itinerary()
    }

    pub fn activity_logs(&self) -> &[ActivityLogEntry] {
        self.routing_slip.activity_logs()
    }

    pub fn variables(&self) -> &Variables {
        self.routing_slip.variables()
    }

    /// The arguments of the step about to execute.
    pub fn arguments(&self) -> Option<&Arguments> {
        self.routing_slip.itinerary().first().map(|step| &step.arguments)
    }
}

/// Asks the activity at the tail of the activity log to undo its execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensateActivity {
    pub routing_slip: RoutingSlip,
}

impl CompensateActivity {
    /// Contract name used as the transport message type.
    pub const MESSAGE_TYPE: &'static str = "CompensateActivity";

    /// Wraps a slip headed for its next compensate address.
    pub fn new(routing_slip: RoutingSlip) -> Self {
        Self { routing_slip }
    }

    /// Returns the slip's tracking number.
    pub fn tracking_number(&self) -> TrackingNumber {
        self.routing_slip.tracking_number()
    }

    /// Returns the executions still to undo, the next one last.
    pub fn activity_logs(&self) -> &[ActivityLogEntry] {
        self.routing_slip.activity_logs()
    }

    pub fn variables(&self) -> &Variables {
        self.routing_slip.variables()
    }

    /// The compensation data of the log entry about to be undone.
    pub fn compensation_data(&self) -> Option<&serde_json::Value> {
        self.routing_slip
            .activity_logs()
            .last()
            .map(|entry| &entry.compensation_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RoutingSlipBuilder;
    use chrono::Utc;
    use common::{Address, ExecutionId};
    use serde_json::json;

    fn slip() -> RoutingSlip {
        RoutingSlipBuilder::new()
            .add_activity(
                ActivityStep::new(
                    "process_payment",
                    Address::new("queue:process_payment_execute"),
                    Address::new("queue:process_payment_compensate"),
                )
                .with_arguments(&json!({"amount_cents": 4500}))
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn execute_exposes_head_arguments() {
        let message = ExecuteActivity::new(slip());
        assert_eq!(message.arguments().unwrap()["amount_cents"], 4500);
        assert_eq!(message.itinerary().len(), 1);
        assert!(message.activity_logs().is_empty());
    }

    #[test]
    fn compensate_exposes_tail_data() {
        let entry = ActivityLogEntry {
            execution_id: ExecutionId::new(),
            name: "process_payment".to_string(),
            compensate_address: Address::new("queue:process_payment_compensate"),
            compensation_data: json!({"payment_id": "PAY-0001"}),
            timestamp: Utc::now(),
            duration_ms: 4,
            host: "test-host".to_string(),
        };
        let slip = slip().complete_head(entry, &Variables::new()).unwrap();
        let message = CompensateActivity::new(slip);
        assert_eq!(message.compensation_data().unwrap()["payment_id"], "PAY-0001");
    }

    #[test]
    fn wire_roundtrip() {
        let message = ExecuteActivity::new(slip());
        let json = serde_json::to_string(&message).unwrap();
        let decoded: ExecuteActivity = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, message);
    }
}
