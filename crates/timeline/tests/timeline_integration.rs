//! Integration tests: dispatcher → ProjectionProcessor → timeline and stats views.

use std::sync::Arc;

use common::{Address, TrackingNumber};
use courier::{
    ActivityRegistry, CourierConfig, CourierMessage, CreateShipmentActivity, Dispatcher,
    ProcessPaymentActivity, ReserveInventoryActivity,
};
use routing_slip::{ExecuteActivity, RoutingSlipBuilder, RoutingSlipEventKind, Subscription};
use serde_json::json;
use timeline::{
    ActivityStatsView, Projection, ProjectionProcessor, RoutingSlipStatus,
    RoutingSlipTimelineView,
};
use transport::{InMemoryTransport, SendTransport};

struct TestHarness {
    transport: InMemoryTransport,
    registry: ActivityRegistry,
    dispatcher: Dispatcher<InMemoryTransport>,
    payment: ProcessPaymentActivity,
    inventory: ReserveInventoryActivity,
    processor: Arc<ProjectionProcessor>,
    timelines: RoutingSlipTimelineView,
    stats: ActivityStatsView,
}

impl TestHarness {
    fn new() -> Self {
        let transport = InMemoryTransport::new();
        let inventory = ReserveInventoryActivity::new();
        let payment = ProcessPaymentActivity::new();

        let mut registry = ActivityRegistry::default();
        registry
            .register(ReserveInventoryActivity::NAME, inventory.clone())
            .register(ProcessPaymentActivity::NAME, payment.clone())
            .register(CreateShipmentActivity::NAME, CreateShipmentActivity::new());

        let timelines = RoutingSlipTimelineView::new();
        let stats = ActivityStatsView::new();
        let mut processor = ProjectionProcessor::new();
        processor.register(Box::new(timelines.clone()));
        processor.register(Box::new(stats.clone()));
        let processor = Arc::new(processor);

        let mut dispatcher =
            Dispatcher::from_registry(&registry, transport.clone(), &CourierConfig::default());
        dispatcher.bind_consumer(Self::timeline_address(), processor.clone());

        Self {
            transport,
            registry,
            dispatcher,
            payment,
            inventory,
            processor,
            timelines,
            stats,
        }
    }

    fn timeline_address() -> Address {
        Address::new("queue:routing_slip_timeline")
    }

    async fn submit(&self, digital: bool) -> TrackingNumber {
        let slip = RoutingSlipBuilder::new()
            .add_variable("order_id", "ORD-2001")
            .unwrap()
            .add_activity(
                self.registry
                    .step(
                        ReserveInventoryActivity::NAME,
                        &json!({"items": [{"product_id": "SKU-001", "quantity": 1}]}),
                    )
                    .unwrap(),
            )
            .add_activity(
                self.registry
                    .step(ProcessPaymentActivity::NAME, &json!({"amount_cents": 1999}))
                    .unwrap(),
            )
            .add_activity(
                self.registry
                    .step(CreateShipmentActivity::NAME, &json!({"digital": digital}))
                    .unwrap(),
            )
            .add_subscription(Subscription::all(Self::timeline_address()))
            .build()
            .unwrap();

        let tracking_number = slip.tracking_number();
        let address = slip.next_address().unwrap().clone();
        let message = CourierMessage::from(ExecuteActivity::new(slip))
            .encode()
            .unwrap();
        self.transport.send(&address, message).await.unwrap();
        tracking_number
    }
}

#[tokio::test]
async fn test_completed_slip_timeline() {
    let h = TestHarness::new();
    let tn = h.submit(false).await;
    h.dispatcher.run_until_idle().await.unwrap();

    let timeline = h.timelines.get(tn).await.unwrap();
    assert_eq!(timeline.status, RoutingSlipStatus::Completed);
    assert_eq!(
        timeline.executed,
        vec!["reserve_inventory", "process_payment", "create_shipment"]
    );
    assert_eq!(timeline.variables["shipment_id"], "SHIP-0001");
    assert!(timeline.duration_ms.is_some());
    assert_eq!(h.processor.journal_len().await, 4);
}

#[tokio::test]
async fn test_faulted_slip_timeline_lists_compensations() {
    let h = TestHarness::new();
    h.payment.set_fail_on_charge(true).await;
    let tn = h.submit(false).await;
    h.dispatcher.run_until_idle().await.unwrap();

    let timeline = h.timelines.get(tn).await.unwrap();
    assert_eq!(timeline.status, RoutingSlipStatus::Faulted);
    assert_eq!(timeline.executed, vec!["reserve_inventory"]);
    assert_eq!(timeline.faulted_activity.as_deref(), Some("process_payment"));
    assert_eq!(timeline.compensated, vec!["reserve_inventory"]);
    assert_eq!(timeline.activity_exceptions.len(), 1);
    assert_eq!(
        timeline.kinds(),
        vec![
            RoutingSlipEventKind::ActivityCompleted,
            RoutingSlipEventKind::ActivityFaulted,
            RoutingSlipEventKind::ActivityCompensated,
            RoutingSlipEventKind::Faulted,
        ]
    );

    let payment = h.stats.get(ProcessPaymentActivity::NAME).await.unwrap();
    assert_eq!(payment.faults, 1);
    assert_eq!(payment.executions, 0);
}

#[tokio::test]
async fn test_compensation_failure_shows_on_timeline() {
    let h = TestHarness::new();
    h.inventory.set_fail_on_release(true).await;
    h.payment.set_fail_on_charge(true).await;
    let tn = h.submit(false).await;
    h.dispatcher.run_until_idle().await.unwrap();

    let timeline = h.timelines.get(tn).await.unwrap();
    assert_eq!(timeline.status, RoutingSlipStatus::Faulted);
    assert!(timeline.compensated.is_empty());
    assert_eq!(timeline.compensation_failures, vec!["reserve_inventory"]);
}

#[tokio::test]
async fn test_terminated_slip_timeline() {
    let h = TestHarness::new();
    let tn = h.submit(true).await;
    h.dispatcher.run_until_idle().await.unwrap();

    let timeline = h.timelines.get(tn).await.unwrap();
    assert_eq!(timeline.status, RoutingSlipStatus::Terminated);
    assert_eq!(
        timeline.reason.as_deref(),
        Some("digital order, nothing to ship")
    );
    assert_eq!(
        timeline.executed,
        vec!["reserve_inventory", "process_payment", "create_shipment"]
    );
}

#[tokio::test]
async fn test_rebuild_reproduces_views() {
    let h = TestHarness::new();
    let completed = h.submit(false).await;
    h.dispatcher.run_until_idle().await.unwrap();
    let before = h.stats.all().await;

    h.processor.rebuild_all().await.unwrap();

    assert_eq!(h.stats.all().await, before);
    assert_eq!(
        h.timelines.get(completed).await.map(|t| t.status),
        Some(RoutingSlipStatus::Completed)
    );
    assert_eq!(h.timelines.position().await.events_processed, 4);
}
