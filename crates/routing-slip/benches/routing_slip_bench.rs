use chrono::Utc;
use common::{Address, ExecutionId};
use criterion::{Criterion, criterion_group, criterion_main};
use routing_slip::{
    ActivityLogEntry, ActivityStep, ExecuteActivity, ItineraryBuilder, RoutingSlip,
    RoutingSlipBuilder, Variables,
};
use serde_json::json;

fn step(name: &str) -> ActivityStep {
    ActivityStep::new(
        name,
        Address::from_parts("queue", &format!("{name}_execute")),
        Address::from_parts("queue", &format!("{name}_compensate")),
    )
    .with_arguments(&json!({"order_id": "ORD-BENCH", "amount_cents": 4500}))
    .unwrap()
}

fn make_slip(activities: usize) -> RoutingSlip {
    let mut builder = RoutingSlipBuilder::new();
    for i in 0..activities {
        builder = builder.add_activity(step(&format!("activity_{i}")));
    }
    builder.add_variable("customer", "bench").unwrap().build().unwrap()
}

fn log_entry(name: &str) -> ActivityLogEntry {
    ActivityLogEntry {
        execution_id: ExecutionId::new(),
        name: name.to_string(),
        compensate_address: Address::from_parts("queue", &format!("{name}_compensate")),
        compensation_data: json!({"id": "RES-0001"}),
        timestamp: Utc::now(),
        duration_ms: 1,
        host: "bench".to_string(),
    }
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("routing_slip/build_10", |b| {
        b.iter(|| make_slip(10));
    });
}

fn bench_complete_head(c: &mut Criterion) {
    let slip = make_slip(10);
    let mut variables = Variables::new();
    variables.insert("reservation_id".into(), json!("RES-0001"));

    c.bench_function("routing_slip/complete_head", |b| {
        b.iter(|| {
            let next = slip
                .complete_head(log_entry("activity_0"), &variables)
                .unwrap();
            ItineraryBuilder::new(&next).append(step("audit")).build()
        });
    });
}

fn bench_wire_roundtrip(c: &mut Criterion) {
    let message = ExecuteActivity::new(make_slip(10));

    c.bench_function("routing_slip/wire_roundtrip", |b| {
        b.iter(|| {
            let json = serde_json::to_vec(&message).unwrap();
            let _decoded: ExecuteActivity = serde_json::from_slice(&json).unwrap();
        });
    });
}

criterion_group!(benches, bench_build, bench_complete_head, bench_wire_roundtrip);
criterion_main!(benches);
