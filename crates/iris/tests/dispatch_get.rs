//! End-to-end GET dispatch tests.
//!
//! These run full dispatches through the dispatcher, the built-in GET
//! handler and the service pipeline against a mock transporter:
//!
//! - member fetch with a root identity
//! - authorization refusal without an identity
//! - endpoint specificity selection
//! - bulk-member fan-out with strict per-id sequencing

use iris::{create, Definitions, Resources};
use iris_core::{Action, Ident, Payload, Status};
use iris_test::MockTransporter;
use serde_json::{json, Value};
use std::sync::Arc;

fn resources_with(transporter: Arc<MockTransporter>) -> Resources {
    let mut resources = Resources::default();
    resources
        .transporters
        .insert("mock".to_string(), transporter);
    resources
}

fn definitions(value: Value) -> Definitions {
    serde_json::from_value(value).unwrap()
}

fn get_entry(id: &str) -> Action {
    Action::new("GET")
        .with_payload(Payload::for_type("entry").with_id(id))
        .with_ident(Ident::root())
}

#[tokio::test]
async fn test_gets_one_entry_with_root_ident() {
    let transporter = Arc::new(MockTransporter::ok_with(
        json!([{ "id": "ent1", "title": "Entry 1" }]),
    ));
    let instance = create(
        definitions(iris_test::entries_definitions()),
        resources_with(transporter.clone()),
        vec![],
    )
    .unwrap();

    let response = instance.dispatch(get_entry("ent1")).await;

    assert_eq!(response.status, Some(Status::Ok), "{:?}", response.error);
    let data = response.data.unwrap();
    assert_eq!(data[0]["id"], "ent1");
    assert_eq!(data[0]["$type"], "entry");
    assert_eq!(data[0]["title"], "Entry 1");

    // The member endpoint was selected and the request sent once
    let sent = transporter.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload.ids(), vec!["ent1"]);
}

#[tokio::test]
async fn test_refuses_get_without_ident_when_auth_required() {
    let mut defs = iris_test::entries_definitions();
    defs["schemas"][0]["access"] = json!("auth");

    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    let instance = create(
        definitions(defs),
        resources_with(transporter.clone()),
        vec![],
    )
    .unwrap();

    let action = Action::new("GET").with_payload(Payload::for_type("entry").with_id("ent1"));
    let response = instance.dispatch(action).await;

    assert_eq!(response.status, Some(Status::Noaccess));
    assert_eq!(response.reason.as_deref(), Some("NO_IDENT"));
    assert!(
        transporter.sent().is_empty(),
        "a refused action must never reach the transporter"
    );
}

#[tokio::test]
async fn test_selects_more_specific_endpoint_when_filter_is_satisfied() {
    let mut defs = iris_test::entries_definitions();
    defs["services"][0]["endpoints"] = json!([
        { "id": "plain", "match": { "type": "entry", "scope": "collection" } },
        { "id": "archived",
          "options": { "uri": "http://api.test/entries/archived" },
          "match": {
            "type": "entry", "scope": "collection", "params": { "archived": true }
        } }
    ]);

    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    let instance = create(
        definitions(defs),
        resources_with(transporter.clone()),
        vec![],
    )
    .unwrap();

    let with_param = Action::new("GET")
        .with_payload(Payload::for_type("entry").with_param("archived", json!(true)))
        .with_ident(Ident::root());
    let response = instance.dispatch(with_param).await;
    assert_eq!(response.status, Some(Status::Ok));

    let without_param = Action::new("GET")
        .with_payload(Payload::for_type("entry"))
        .with_ident(Ident::root());
    let response = instance.dispatch(without_param).await;
    assert_eq!(response.status, Some(Status::Ok));

    let sent = transporter.sent();
    // The more specific endpoint (with the params criterion) won when
    // its param was present, the plain one when it was not
    assert_eq!(
        sent[0].meta.options.as_ref().unwrap()["uri"],
        "http://api.test/entries/archived"
    );
    assert_eq!(
        sent[1].meta.options.as_ref().unwrap()["uri"],
        "http://api.test/entries"
    );
}

#[tokio::test]
async fn test_endpoint_selection_is_deterministic() {
    let transporter = Arc::new(MockTransporter::ok_with(json!([{ "id": "ent1" }])));
    let instance = create(
        definitions(iris_test::entries_definitions()),
        resources_with(transporter.clone()),
        vec![],
    )
    .unwrap();

    let first = instance.dispatch(get_entry("ent1")).await;
    let second = instance.dispatch(get_entry("ent1")).await;

    let sent = transporter.sent();
    assert_eq!(first.status, second.status);
    assert_eq!(sent[0].meta.options, sent[1].meta.options);
}

#[tokio::test]
async fn test_bulk_ids_fan_out_as_sequential_member_requests() {
    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    transporter.push_response(iris_core::Response::ok(Some(
        json!([{ "id": "ent1", "title": "Entry 1" }]),
    )));
    transporter.push_response(iris_core::Response::ok(Some(
        json!([{ "id": "ent2", "title": "Entry 2" }]),
    )));

    let instance = create(
        definitions(iris_test::entries_definitions()),
        resources_with(transporter.clone()),
        vec![],
    )
    .unwrap();

    let action = Action::new("GET")
        .with_payload(
            Payload::for_type("entry").with_id(vec!["ent1".to_string(), "ent2".to_string()]),
        )
        .with_ident(Ident::root());
    let response = instance.dispatch(action).await;

    assert_eq!(response.status, Some(Status::Ok), "{:?}", response.error);
    let data = response.data.unwrap();
    assert_eq!(data[0]["id"], "ent1");
    assert_eq!(data[1]["id"], "ent2");

    // One member request per id, in id order
    let sent = transporter.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].payload.ids(), vec!["ent1"]);
    assert_eq!(sent[1].payload.ids(), vec!["ent2"]);
}

#[tokio::test]
async fn test_empty_id_array_is_noaction() {
    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    let instance = create(
        definitions(iris_test::entries_definitions()),
        resources_with(transporter),
        vec![],
    )
    .unwrap();

    let action = Action::new("GET")
        .with_payload(Payload::for_type("entry").with_id(Vec::<String>::new()))
        .with_ident(Ident::root());
    let response = instance.dispatch(action).await;
    assert_eq!(response.status, Some(Status::Noaction));
}

#[tokio::test]
async fn test_no_matching_endpoint_is_badrequest() {
    let mut defs = iris_test::entries_definitions();
    defs["services"][0]["endpoints"] = json!([
        { "id": "users-only", "match": { "type": "user" } }
    ]);

    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    let instance = create(definitions(defs), resources_with(transporter), vec![]).unwrap();

    let response = instance.dispatch(get_entry("ent1")).await;
    assert_eq!(response.status, Some(Status::Badrequest));
    assert!(response.error.unwrap().contains("No endpoint matching"));
}

#[tokio::test]
async fn test_unknown_type_resolves_no_service() {
    let transporter = Arc::new(MockTransporter::ok_with(json!([])));
    let instance = create(
        definitions(iris_test::entries_definitions()),
        resources_with(transporter),
        vec![],
    )
    .unwrap();

    let action = Action::new("GET")
        .with_payload(Payload::for_type("unknown"))
        .with_ident(Ident::root());
    let response = instance.dispatch(action).await;
    assert_eq!(response.status, Some(Status::Badrequest));
    assert_eq!(
        response.error.as_deref(),
        Some("No service exists for type 'unknown'")
    );
}
