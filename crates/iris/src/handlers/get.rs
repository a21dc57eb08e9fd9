//! The `GET` handler.
//!
//! Fetches one or several items from a service. Bulk requests for
//! several ids against a service without a `members`-scoped endpoint
//! are fanned out as individual member requests, strictly sequenced to
//! preserve per-id ordering, and their responses combined.

use iris_core::{Action, BoxFuture, HandlerResult, OneOrMany, Response, Status};
use iris_service::{Endpoint, Service};
use std::sync::Arc;

use crate::dispatch::{ActionHandler, HandlerResources};

pub(crate) fn unknown_service_error(
    types: &[&str],
    service_id: Option<&str>,
    handler: &str,
) -> Response {
    let message = match service_id {
        Some(id) => format!("Service with id '{id}' does not exist"),
        None => format!("No service exists for type '{}'", types.join("', '")),
    };
    Response::error_with_status(message, format!("handler:{handler}"), Status::Badrequest)
}

fn no_endpoint_error(action: &Action, service_id: &str) -> Response {
    Response::error_with_status(
        format!(
            "No endpoint matching {} request to service '{service_id}'.",
            action.action_type
        ),
        "handler:GET",
        Status::Badrequest,
    )
}

/// Flattens a one-element id list to a single id.
fn flatten_single_id(mut action: Action) -> Action {
    let single = match &action.payload.id {
        Some(OneOrMany::Many(ids)) if ids.len() == 1 => Some(ids[0].clone()),
        _ => None,
    };
    if let Some(id) = single {
        action.payload.id = Some(OneOrMany::One(id));
    }
    action
}

fn is_error_response(response: &Response) -> bool {
    !matches!(response.status, Some(Status::Ok | Status::Notfound))
}

fn combine_individual_responses(action: &Action, responses: Vec<Response>) -> Response {
    if responses.iter().any(is_error_response) {
        let ids = action.payload.ids().join(", ");
        return Response::error(
            format!("One or more of the requests for ids {ids} failed."),
            "handler:GET",
        );
    }

    let data = responses
        .into_iter()
        .map(|response| match response.data {
            Some(serde_json::Value::Array(mut items)) => {
                if items.is_empty() {
                    serde_json::Value::Null
                } else {
                    items.swap_remove(0)
                }
            }
            Some(value) => value,
            None => serde_json::Value::Null,
        })
        .collect();
    Response {
        status: Some(Status::Ok),
        data: Some(serde_json::Value::Array(data)),
        ..Response::default()
    }
}

async fn run_one(service: &Service, endpoint: &Endpoint, action: Action) -> Response {
    let request_action = service.mutate_request(action.clone(), endpoint).await;
    let response = service.send(request_action).await;
    service
        .mutate_response(action.set_response(response), endpoint)
        .await
}

/// Fans a several-id action out as individual member requests.
///
/// Requests run strictly one at a time, preserving per-id ordering and
/// avoiding backend contention.
async fn run_as_individual_actions(
    action: Action,
    service: &Service,
    endpoint: &Endpoint,
) -> Response {
    let ids: Vec<String> = action
        .payload
        .ids()
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut responses = Vec::with_capacity(ids.len());
    for id in ids {
        let mut one = action.clone();
        one.payload.id = Some(OneOrMany::One(id));
        responses.push(run_one(service, endpoint, one).await);
    }
    combine_individual_responses(&action, responses)
}

fn is_members_scope(endpoint: &Endpoint) -> bool {
    endpoint.match_criteria().scope == Some(iris_service::Scope::Members)
}

async fn run_one_or_many(action: Action, service: &Arc<Service>) -> Response {
    let Some(endpoint) = service.endpoint_from_action(&action, false) else {
        return no_endpoint_error(&action, service.id());
    };

    let authorized = service.authorize_action(action);
    if authorized.status().is_some() {
        // Already refused: mutate the response so the caller still gets
        // the endpoint's response shape
        return service.mutate_response(authorized, endpoint).await;
    }

    let several_ids = authorized
        .payload
        .id
        .as_ref()
        .is_some_and(OneOrMany::is_many);
    if several_ids && !is_members_scope(endpoint) {
        run_as_individual_actions(authorized, service, endpoint).await
    } else {
        run_one(service, endpoint, authorized).await
    }
}

/// Gets one or several items from a service.
pub struct GetHandler;

impl ActionHandler for GetHandler {
    fn handle<'a>(
        &'a self,
        action: Action,
        resources: &'a HandlerResources,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if action
                .payload
                .id
                .as_ref()
                .is_some_and(|id| id.is_many() && id.is_empty())
            {
                return Ok(Response::error_with_status(
                    "GET action was dispatched with empty array of ids",
                    "handler:GET",
                    Status::Noaction,
                ));
            }

            let action = flatten_single_id(action);
            let types = action.payload.types();
            let service_id = action.payload.target_service.as_deref();
            let Some(service) = resources.get_service(&types, service_id) else {
                return Ok(unknown_service_error(&types, service_id, "GET"));
            };

            tracing::debug!(
                service = %service.id(),
                types = ?types,
                "GET: fetching from service"
            );
            Ok(run_one_or_many(action, &service).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::Payload;
    use serde_json::json;

    #[test]
    fn test_flattens_single_element_id_array() {
        let action = Action::new("GET").with_payload(
            Payload::for_type("entry").with_id(vec!["ent1".to_string()]),
        );
        let flattened = flatten_single_id(action);
        assert_eq!(
            flattened.payload.id,
            Some(OneOrMany::One("ent1".to_string()))
        );
    }

    #[test]
    fn test_combines_individual_responses() {
        let action = Action::new("GET").with_payload(
            Payload::for_type("entry")
                .with_id(vec!["ent1".to_string(), "ent2".to_string()]),
        );
        let responses = vec![
            Response::ok(Some(json!([{ "id": "ent1" }]))),
            Response::ok(Some(json!([{ "id": "ent2" }]))),
        ];
        let combined = combine_individual_responses(&action, responses);
        assert_eq!(combined.status, Some(Status::Ok));
        assert_eq!(
            combined.data.unwrap(),
            json!([{ "id": "ent1" }, { "id": "ent2" }])
        );
    }

    #[test]
    fn test_combining_with_a_failure_is_an_error() {
        let action = Action::new("GET").with_payload(
            Payload::for_type("entry")
                .with_id(vec!["ent1".to_string(), "ent2".to_string()]),
        );
        let responses = vec![
            Response::ok(Some(json!([{ "id": "ent1" }]))),
            Response::error("It went wrong", "service:entries"),
        ];
        let combined = combine_individual_responses(&action, responses);
        assert_eq!(combined.status, Some(Status::Error));
        assert!(combined.error.unwrap().contains("ent1, ent2"));
    }

    #[test]
    fn test_notfound_does_not_fail_the_batch() {
        let action = Action::new("GET").with_payload(
            Payload::for_type("entry")
                .with_id(vec!["ent1".to_string(), "ent2".to_string()]),
        );
        let responses = vec![
            Response::ok(Some(json!([{ "id": "ent1" }]))),
            Response::with_status(Status::Notfound),
        ];
        let combined = combine_individual_responses(&action, responses);
        assert_eq!(combined.status, Some(Status::Ok));
        assert_eq!(combined.data.unwrap(), json!([{ "id": "ent1" }, null]));
    }

    #[test]
    fn test_unknown_service_error_messages() {
        let by_type = unknown_service_error(&["entry"], None, "GET");
        assert_eq!(
            by_type.error.as_deref(),
            Some("No service exists for type 'entry'")
        );

        let by_id = unknown_service_error(&[], Some("store"), "GET");
        assert_eq!(
            by_id.error.as_deref(),
            Some("Service with id 'store' does not exist")
        );
        assert_eq!(by_id.status, Some(Status::Badrequest));
    }
}
