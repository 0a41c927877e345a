//! Transactional outbox, worker and inbox working together.

use chrono::Duration;
use docket_codec::{Timestamp, Value};
use docket_core::{Clock, CoreError, CoreResult, Repository};
use docket_outbox::{BusError, EventEnvelope, InMemoryBus, OutboxError, WorkerConfig};
use docket_testkit::prelude::*;

fn signup(customer: &str) -> Value {
    Value::map([("customerId", Value::from(customer))])
}

fn queue_one(ctx: &TestContext, topic: &str) -> String {
    let mut outbox = ctx.outbox();
    ctx.uow()
        .commit(&mut outbox, |_, outbox| -> CoreResult<String> {
            Ok(outbox.queue(signup("c1"), topic))
        })
        .unwrap()
        .value
}

fn event_doc(ctx: &TestContext, id: &str) -> Option<docket_core::Document> {
    ctx.db.document(&outbox_collection().doc(id).unwrap())
}

#[test]
fn business_change_and_event_commit_together() {
    init_tracing();
    let ctx = TestContext::new();
    let mut repos = (CustomerRepo::new(), ctx.outbox());

    let committed = ctx
        .uow()
        .commit(&mut repos, |_, repos| -> CoreResult<String> {
            let (customers, outbox) = repos;
            customers.add(Customer::new("c1", "Ada"));
            Ok(outbox.queue(signup("c1"), "customer.created"))
        })
        .unwrap();

    assert_eq!(committed.value, "evt-1");
    assert_eq!(committed.summary.created, 2);
    let stored = event_doc(&ctx, "evt-1").unwrap();
    assert_eq!(stored["topic"], Value::from("customer.created"));
    assert_eq!(stored["sentToBus"], Value::from(false));
    assert_eq!(stored["timeCreated"], Value::Instant(Timestamp::from_utc(fixture_time())));
    assert!(!stored.contains_key("timeSent"));
    assert_eq!(stored["data"], signup("c1"));
}

#[test]
fn failed_work_queues_nothing() {
    let ctx = TestContext::new();
    let mut repos = (CustomerRepo::new(), ctx.outbox());

    let result = ctx
        .uow()
        .commit(&mut repos, |_, repos| -> CoreResult<()> {
            let (customers, outbox) = repos;
            customers.add(Customer::new("c1", "Ada"));
            outbox.queue(signup("c1"), "customer.created");
            Err(CoreError::invalid_operation("validation failed"))
        });

    assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    assert!(ctx.db.is_empty());
}

#[test]
fn conflicting_business_write_queues_nothing() {
    let ctx = TestContext::new();
    ctx.seed_customer(&Customer::new("c1", "Ada"));
    let mut repos = (CustomerRepo::new(), ctx.outbox());

    let result = ctx
        .uow()
        .commit(&mut repos, |_, repos| -> CoreResult<()> {
            let (customers, outbox) = repos;
            outbox.queue(signup("c1"), "customer.created");
            customers.add(Customer::new("c1", "Ada again"));
            Ok(())
        });

    assert!(matches!(result, Err(CoreError::Conflict { .. })));
    assert_eq!(ctx.db.len(), 1);
    assert!(event_doc(&ctx, "evt-1").is_none());
}

#[test]
fn get_next_to_send_until_drained() {
    let ctx = TestContext::new();
    queue_one(&ctx, "t");
    let mut outbox = ctx.outbox();

    let sent = ctx
        .uow()
        .commit(&mut outbox, |coord, outbox| {
            let event = outbox.get_next_to_send(coord)?;
            let id = event.id.clone();
            outbox.mark_sent(event);
            Ok::<_, CoreError>(id)
        })
        .unwrap();
    assert_eq!(sent.value, "evt-1");
    assert_eq!(sent.summary.updated, 1);

    let stored = event_doc(&ctx, "evt-1").unwrap();
    assert_eq!(stored["sentToBus"], Value::from(true));
    assert_eq!(stored["timeSent"], Value::Instant(Timestamp::from_utc(fixture_time())));

    let drained = ctx.uow().commit(&mut outbox, |coord, outbox| {
        outbox.get_next_to_send(coord).map(|_| ())
    });
    assert!(drained.unwrap_err().is_not_found());
}

#[test]
fn worker_publishes_in_creation_order() {
    let ctx = TestContext::new();
    let start = fixture_time();

    ctx.clock.set(start + Duration::minutes(10));
    queue_one(&ctx, "late");
    ctx.clock.set(start);
    queue_one(&ctx, "early");
    ctx.clock.set(start + Duration::minutes(5));
    queue_one(&ctx, "middle");

    let bus = InMemoryBus::new();
    ctx.clock.set(start + Duration::hours(1));
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()));
    let report = worker.drain().unwrap();

    assert_eq!(report.published, vec!["evt-2", "evt-3", "evt-1"]);
    let topics: Vec<_> = bus.published().into_iter().map(|m| m.topic).collect();
    assert_eq!(topics, vec!["early", "middle", "late"]);

    let first = &bus.published()[0];
    assert_eq!(first.time_created, start);
    assert_eq!(first.time_sent, start + Duration::hours(1));
    assert_eq!(first.data["customerId"].as_str(), Some("c1"));

    assert_eq!(worker.stats().events_published, 3);
    assert!(worker.process_next().unwrap().is_none());
    assert_eq!(ctx.db.len(), 3);
}

#[test]
fn drain_stops_at_max_events() {
    let ctx = TestContext::new();
    for _ in 0..3 {
        queue_one(&ctx, "t");
        ctx.clock.advance(Duration::seconds(1));
    }

    let bus = InMemoryBus::new();
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()).with_max_events(2));
    assert_eq!(worker.drain().unwrap().len(), 2);
    assert_eq!(worker.drain().unwrap().published, vec!["evt-3"]);
    assert!(worker.drain().unwrap().is_empty());
}

#[test]
fn failed_publish_leaves_event_unsent() {
    let ctx = TestContext::new();
    queue_one(&ctx, "t");
    let bus = InMemoryBus::new();
    bus.fail_next(1);
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()));

    let err = worker.process_next().unwrap_err();
    assert!(matches!(err, OutboxError::Bus(BusError::Unavailable { .. })));
    assert!(bus.is_empty());
    assert_eq!(event_doc(&ctx, "evt-1").unwrap()["sentToBus"], Value::from(false));

    let stats = worker.stats();
    assert_eq!(stats.failed_passes, 1);
    assert!(stats.last_error.is_some());

    assert_eq!(worker.process_next().unwrap().as_deref(), Some("evt-1"));
    assert_eq!(bus.len(), 1);
}

#[test]
fn rejected_topic_blocks_drain() {
    let ctx = TestContext::new();
    queue_one(&ctx, "poison");
    let bus = InMemoryBus::new();
    bus.fail_topic("poison");
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()));

    let err = worker.drain().unwrap_err();
    assert!(matches!(err, OutboxError::Bus(BusError::Rejected { .. })));

    bus.clear_failures();
    assert_eq!(worker.drain().unwrap().published, vec!["evt-1"]);
}

#[test]
fn failed_mark_write_republishes_later() {
    let ctx = TestContext::new();
    queue_one(&ctx, "t");
    ctx.db.fail_writes_to(outbox_collection().doc("evt-1").unwrap());
    let bus = InMemoryBus::new();
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()));

    let err = worker.process_next().unwrap_err();
    assert!(matches!(err, OutboxError::Core(CoreError::Transport { .. })));
    // Published, but the commit that marks it sent never landed.
    assert_eq!(bus.len(), 1);
    assert_eq!(event_doc(&ctx, "evt-1").unwrap()["sentToBus"], Value::from(false));

    ctx.db.clear_write_failures();
    worker.drain().unwrap();
    let copies = bus.published_to("t");
    assert_eq!(copies.len(), 2);
    assert!(copies.iter().all(|m| m.id == "evt-1"));
}

#[test]
fn contended_pass_publishes_again() {
    let ctx = TestContext::new();
    queue_one(&ctx, "t");
    let bus = InMemoryBus::new();
    let worker = ctx.worker(&bus, WorkerConfig::new(outbox_collection()));

    let before = ctx.db.attempts();
    ctx.db.inject_contention(1);
    assert_eq!(worker.process_next().unwrap().as_deref(), Some("evt-1"));

    assert_eq!(ctx.db.attempts() - before, 2);
    assert_eq!(bus.len(), 2);
    assert_eq!(event_doc(&ctx, "evt-1").unwrap()["sentToBus"], Value::from(true));
}

#[test]
fn delete_on_publish_removes_events() {
    let ctx = TestContext::new();
    queue_one(&ctx, "t");
    ctx.clock.advance(Duration::seconds(1));
    queue_one(&ctx, "t");
    let bus = InMemoryBus::new();
    let worker = ctx.worker(
        &bus,
        WorkerConfig::new(outbox_collection()).with_delete_on_publish(true),
    );

    assert_eq!(worker.drain().unwrap().len(), 2);
    assert_eq!(bus.len(), 2);
    assert!(ctx.db.is_empty());
}

/// Applies a signup event at most once per event id.
fn consume(ctx: &TestContext, message: &EventEnvelope) -> Result<bool, OutboxError> {
    let mut repos = (ctx.inbox(), CustomerRepo::new());
    let customer_id = message.data["customerId"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let committed = ctx.uow().commit(&mut repos, |coord, repos| {
        let (inbox, customers) = repos;
        if inbox.did_process_event(coord, &message.id)? {
            return Ok::<_, OutboxError>(false);
        }
        let mut customer = customers.get(coord, &customer_id)?;
        customer.tier += 1;
        customers.add(customer);
        inbox.record(message.id.clone());
        Ok(true)
    })?;
    Ok(committed.value)
}

#[test]
fn inbox_applies_each_event_once() {
    let ctx = TestContext::new();
    ctx.seed_customer(&Customer::new("c1", "Ada"));
    queue_one(&ctx, "customer.upgraded");

    let bus = InMemoryBus::new();
    ctx.worker(&bus, WorkerConfig::new(outbox_collection()))
        .drain()
        .unwrap();

    let wire = bus.published()[0].to_json_bytes().unwrap();
    let message = EventEnvelope::from_json_bytes(&wire).unwrap();
    assert_eq!(message.id, "evt-1");

    assert!(consume(&ctx, &message).unwrap());
    assert!(!consume(&ctx, &message).unwrap());

    let stored = ctx.db.document(&customer_path("c1")).unwrap();
    assert_eq!(stored["tier"], Value::from(2));

    let mut inbox = ctx.inbox();
    let record = ctx
        .uow()
        .commit(&mut inbox, |coord, inbox| inbox.get(coord, "evt-1"))
        .unwrap()
        .value;
    assert_eq!(record.time_received, ctx.clock.now());
}

#[test]
fn failed_handler_leaves_event_unprocessed() {
    let ctx = TestContext::new();
    queue_one(&ctx, "customer.upgraded");
    let bus = InMemoryBus::new();
    ctx.worker(&bus, WorkerConfig::new(outbox_collection()))
        .drain()
        .unwrap();
    let message = bus.published()[0].clone();

    // The customer does not exist yet, so the handler fails after the inbox
    // check and nothing is recorded.
    let err = consume(&ctx, &message).unwrap_err();
    assert!(err.is_not_found());

    let mut inbox = ctx.inbox();
    let missing = ctx
        .uow()
        .commit(&mut inbox, |coord, inbox| inbox.get(coord, "evt-1"));
    assert!(missing.unwrap_err().is_not_found());

    ctx.seed_customer(&Customer::new("c1", "Ada"));
    assert!(consume(&ctx, &message).unwrap());
}
