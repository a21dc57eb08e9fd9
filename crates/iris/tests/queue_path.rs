//! Queue path tests.
//!
//! Actions flagged with `meta.queue` are rerouted to the designated
//! queue service instead of being handled directly. The queue's `ok`
//! becomes `queued` for the caller, other statuses are relayed, and a
//! reply without a status becomes `badresponse`. Without a registered
//! queue service the flag has no effect.

use iris::{create, Definitions, Resources};
use iris_core::{Action, Ident, Payload, Response, Status};
use iris_test::MockTransporter;
use serde_json::{json, Value};
use std::sync::Arc;

fn definitions_with_queue() -> Definitions {
    let mut defs = iris_test::entries_definitions();
    defs["services"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "queue", "transporter": "queue-mock" }));
    defs["queueService"] = json!("queue");
    serde_json::from_value(defs).unwrap()
}

fn resources_with(
    entries: Arc<MockTransporter>,
    queue: Option<Arc<MockTransporter>>,
) -> Resources {
    let mut resources = Resources::default();
    resources.transporters.insert("mock".to_string(), entries);
    if let Some(queue) = queue {
        resources.transporters.insert("queue-mock".to_string(), queue);
    }
    resources
}

fn set_action(meta_id: Option<&str>) -> Action {
    let mut action = Action::new("SET")
        .with_payload(Payload::for_type("entry").with_data(json!([{ "id": "ent1" }])))
        .with_ident(Ident::root())
        .with_queue();
    action.meta.id = meta_id.map(ToString::to_string);
    action
}

#[tokio::test]
async fn test_ok_from_queue_becomes_queued() {
    let entries = Arc::new(MockTransporter::ok_with(json!([])));
    let queue = Arc::new(MockTransporter::answering(Response::ok(None)));
    let instance = create(
        definitions_with_queue(),
        resources_with(entries.clone(), Some(queue.clone())),
        vec![],
    )
    .unwrap();

    let response = instance.dispatch(set_action(Some("action1"))).await;

    assert_eq!(response.status, Some(Status::Queued));
    assert!(
        entries.sent().is_empty(),
        "the action must go to the queue, not the target service"
    );

    // The forwarded action carries the meta.id as cid, a queue
    // timestamp, and nothing else from the original meta
    let forwarded = queue.sent();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].meta.cid.as_deref(), Some("action1"));
    assert!(forwarded[0].meta.authorized);
    assert!(forwarded[0].meta.queued_at.is_some());
    assert!(!forwarded[0].meta.queue);
    assert!(forwarded[0].meta.ident.is_none());
}

#[tokio::test]
async fn test_generates_cid_when_no_meta_id() {
    let entries = Arc::new(MockTransporter::ok_with(json!([])));
    let queue = Arc::new(MockTransporter::answering(Response::ok(None)));
    let instance = create(
        definitions_with_queue(),
        resources_with(entries, Some(queue.clone())),
        vec![],
    )
    .unwrap();

    let response = instance.dispatch(set_action(None)).await;
    assert_eq!(response.status, Some(Status::Queued));

    let forwarded = queue.sent();
    assert!(forwarded[0].meta.cid.as_deref().is_some_and(|cid| !cid.is_empty()));
}

#[tokio::test]
async fn test_non_ok_queue_status_is_relayed() {
    let entries = Arc::new(MockTransporter::ok_with(json!([])));
    let queue = Arc::new(MockTransporter::answering(Response::error_with_status(
        "Queue full",
        "service:queue",
        Status::Timeout,
    )));
    let instance = create(
        definitions_with_queue(),
        resources_with(entries, Some(queue)),
        vec![],
    )
    .unwrap();

    let response = instance.dispatch(set_action(None)).await;
    assert_eq!(response.status, Some(Status::Timeout));
    assert_eq!(response.error.as_deref(), Some("Queue full"));
}

#[tokio::test]
async fn test_missing_status_from_queue_is_badresponse() {
    let entries = Arc::new(MockTransporter::ok_with(json!([])));
    let queue = Arc::new(MockTransporter::answering(Response::default()));
    let instance = create(
        definitions_with_queue(),
        resources_with(entries, Some(queue)),
        vec![],
    )
    .unwrap();

    let response = instance.dispatch(set_action(None)).await;
    assert_eq!(response.status, Some(Status::Badresponse));
    assert_eq!(
        response.error.as_deref(),
        Some("Queue did not respond correctly")
    );
}

#[tokio::test]
async fn test_queue_flag_without_queue_service_dispatches_normally() {
    // No queue service in the definitions at all
    let entries = Arc::new(MockTransporter::ok_with(json!([{ "id": "ent1" }])));
    let defs: Definitions = serde_json::from_value(iris_test::entries_definitions()).unwrap();
    let instance = create(defs, resources_with(entries.clone(), None), vec![]).unwrap();

    let response = instance.dispatch(set_action(Some("action1"))).await;

    assert_eq!(response.status, Some(Status::Ok), "{:?}", response.error);
    assert_eq!(
        entries.sent().len(),
        1,
        "the action must be handled as if the queue flag were absent"
    );
}

#[tokio::test]
async fn test_configured_but_unregistered_queue_service_is_ignored() {
    let entries = Arc::new(MockTransporter::ok_with(json!([{ "id": "ent1" }])));
    let mut defs: Value = iris_test::entries_definitions();
    defs["queueService"] = json!("missing-queue");
    let defs: Definitions = serde_json::from_value(defs).unwrap();
    let instance = create(defs, resources_with(entries.clone(), None), vec![]).unwrap();

    let response = instance.dispatch(set_action(None)).await;
    assert_eq!(response.status, Some(Status::Ok));
    assert_eq!(entries.sent().len(), 1);
}
