//! Item-level (data) authorization.
//!
//! Applied per individual data item in a request or response. Each item
//! carries a `$type` and is judged by the same rule set as action-level
//! authorization, except that `identFromField`/`roleFromField` are
//! resolved per item against the corresponding field value. The
//! aggregate outcome across a collection is `granted` (all pass),
//! `partially` (passing items kept, the rest silently dropped) or
//! `refused` (response status becomes `noaccess`). This layer never
//! fails the pipeline.

use iris_core::{Access, AccessDef, AccessStatus, Action, Ident, Status};
use serde_json::Value;

use crate::action::{authorize_by_allow, has_some_role};
use crate::Schemas;

const RAW_DATA: &str = "RAW_DATA";

fn decide_item(
    schemas: &Schemas,
    ident: Option<&Ident>,
    action_type: &str,
    item: &Value,
    allow_raw: bool,
) -> Result<(), &'static str> {
    let Some(r#type) = item.get("$type").and_then(Value::as_str) else {
        // Untyped data only passes endpoints that explicitly allow raw
        return if allow_raw { Ok(()) } else { Err(RAW_DATA) };
    };

    let Some(schema) = schemas.get(r#type) else {
        return Err("NO_SCHEMA");
    };
    let access = schema
        .access_for_action(action_type)
        .unwrap_or_else(AccessDef::default);

    if let Some(reason) = authorize_by_allow(access.allow.as_deref(), ident.is_some()) {
        return Err(reason.code());
    }

    let roles = access.roles();
    if !roles.is_empty() && !has_some_role(&roles, ident) {
        return Err("MISSING_ROLE");
    }

    let idents = access.idents();
    if !idents.is_empty() {
        let id = ident.and_then(|ident| ident.id.as_deref());
        if !id.is_some_and(|id| idents.contains(&id)) {
            return Err("WRONG_IDENT");
        }
    }

    if let Some(field) = &access.ident_from_field {
        let Some(ident) = ident else {
            return Err("NO_IDENT");
        };
        let owner = item.get(field).and_then(Value::as_str);
        if owner.is_none() || owner != ident.id.as_deref() {
            return Err("WRONG_IDENT");
        }
    }

    if let Some(field) = &access.role_from_field {
        let Some(ident) = ident else {
            return Err("NO_IDENT");
        };
        let required: Vec<&str> = match item.get(field) {
            Some(Value::String(role)) => vec![role.as_str()],
            Some(Value::Array(roles)) => roles.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !required.iter().any(|role| ident.has_role(role)) {
            return Err("MISSING_ROLE");
        }
    }

    Ok(())
}

struct Outcome {
    data: Option<Value>,
    status: AccessStatus,
    reason: Option<&'static str>,
}

fn decide_value(
    schemas: &Schemas,
    ident: Option<&Ident>,
    action_type: &str,
    data: Value,
    allow_raw: bool,
) -> Outcome {
    match data {
        Value::Array(items) => {
            let total = items.len();
            let mut passing = Vec::with_capacity(total);
            let mut first_reason = None;
            for item in items {
                match decide_item(schemas, ident, action_type, &item, allow_raw) {
                    Ok(()) => passing.push(item),
                    Err(reason) => {
                        first_reason.get_or_insert(reason);
                    }
                }
            }

            if first_reason.is_none() {
                Outcome {
                    data: Some(Value::Array(passing)),
                    status: AccessStatus::Granted,
                    reason: None,
                }
            } else if passing.is_empty() && total > 0 {
                Outcome {
                    data: None,
                    status: AccessStatus::Refused,
                    reason: first_reason,
                }
            } else {
                Outcome {
                    data: Some(Value::Array(passing)),
                    status: AccessStatus::Partially,
                    reason: first_reason,
                }
            }
        }
        item => match decide_item(schemas, ident, action_type, &item, allow_raw) {
            Ok(()) => Outcome {
                data: Some(item),
                status: AccessStatus::Granted,
                reason: None,
            },
            Err(reason) => Outcome {
                data: None,
                status: AccessStatus::Refused,
                reason: Some(reason),
            },
        },
    }
}

fn access_annotation(status: AccessStatus, ident: Option<&Ident>) -> Access {
    Access {
        status,
        ident: ident.cloned(),
        scheme: Some("data".to_string()),
    }
}

/// Authorizes request data before it is sent to a service.
///
/// Operates on `payload.data`. Refused items are dropped; when no item
/// passes, a `noaccess` response is attached and the data removed.
#[must_use]
pub fn authorize_data_to_service(schemas: &Schemas, mut action: Action, allow_raw: bool) -> Action {
    if action.ident().is_some_and(Ident::is_root) {
        return action;
    }
    let Some(data) = action.payload.data.take() else {
        return action;
    };

    let ident = action.meta.ident.clone();
    let outcome = decide_value(
        schemas,
        ident.as_ref(),
        &action.action_type,
        data,
        allow_raw,
    );

    action.payload.data = outcome.data;
    match outcome.status {
        AccessStatus::Granted => action,
        AccessStatus::Partially => {
            tracing::debug!(
                action = %action.action_type,
                "Request data partially authorized, refused items removed"
            );
            let mut response = action.response.take().unwrap_or_default();
            response.access = Some(access_annotation(AccessStatus::Partially, ident.as_ref()));
            action.set_response(response)
        }
        AccessStatus::Refused => {
            let mut response = action.response.take().unwrap_or_default();
            response.status = Some(Status::Noaccess);
            response.error = Some("Authentication was refused for request data".to_string());
            response.reason = outcome.reason.map(ToString::to_string);
            response.origin = Some("auth:data".to_string());
            response.access = Some(access_annotation(AccessStatus::Refused, ident.as_ref()));
            action.set_response(response)
        }
    }
}

/// Authorizes response data arriving from a service.
///
/// Operates on `response.data`. Responses already carrying an error
/// status are passed through untouched. Partial outcomes keep the
/// passing items and attach a warning; fully refused outcomes replace
/// the status with `noaccess`.
#[must_use]
pub fn authorize_data_from_service(
    schemas: &Schemas,
    mut action: Action,
    allow_raw: bool,
) -> Action {
    if action.ident().is_some_and(Ident::is_root) {
        return action;
    }
    if action.status().is_some_and(Status::is_error) {
        return action;
    }
    let Some(mut response) = action.response.take() else {
        return action;
    };
    let Some(data) = response.data.take() else {
        return action.set_response(response);
    };

    let ident = action.meta.ident.clone();
    let outcome = decide_value(
        schemas,
        ident.as_ref(),
        &action.action_type,
        data,
        allow_raw,
    );

    response.data = outcome.data;
    match outcome.status {
        AccessStatus::Granted => {}
        AccessStatus::Partially => {
            response.access = Some(access_annotation(AccessStatus::Partially, ident.as_ref()));
            response.warning =
                Some("Some items were removed from response data due to lack of access".to_string());
        }
        AccessStatus::Refused => {
            response.status = Some(Status::Noaccess);
            response.error = Some("Authentication was refused for response data".to_string());
            response.reason = outcome.reason.map(ToString::to_string);
            response.origin = Some("auth:data".to_string());
            response.access = Some(access_annotation(AccessStatus::Refused, ident.as_ref()));
        }
    }
    action.set_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::{Payload, Response, Schema, SchemaDef};
    use serde_json::json;

    fn schemas() -> Schemas {
        let defs: Vec<SchemaDef> = serde_json::from_value(json!([
            { "id": "entry", "access": "all" },
            { "id": "user", "access": { "identFromField": "id" } },
            { "id": "secret", "access": "none" },
            { "id": "note", "access": { "roleFromField": "requiredRole" } }
        ]))
        .unwrap();
        defs.into_iter()
            .map(|def| (def.id.clone(), Schema::from_def(def)))
            .collect()
    }

    fn response_action(data: Value, ident: Option<Ident>) -> Action {
        let mut action = Action::new("GET")
            .with_payload(Payload::for_type("entry"))
            .set_response(Response::ok(Some(data)));
        action.meta.ident = ident;
        action
    }

    #[test]
    fn test_root_is_always_granted() {
        let action = response_action(
            json!([{ "$type": "secret", "id": "s1" }]),
            Some(Ident::root()),
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let response = result.response.unwrap();
        assert_eq!(response.status, Some(Status::Ok));
        assert_eq!(response.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_all_items_granted() {
        let action = response_action(
            json!([{ "$type": "entry", "id": "ent1" }, { "$type": "entry", "id": "ent2" }]),
            None,
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let response = result.response.unwrap();
        assert_eq!(response.status, Some(Status::Ok));
        assert!(response.access.is_none());
        assert_eq!(response.data.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_partially_granted_drops_refused_items() {
        let action = response_action(
            json!([
                { "$type": "entry", "id": "ent1" },
                { "$type": "secret", "id": "s1" }
            ]),
            Some(Ident::with_id("johnf")),
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let response = result.response.unwrap();

        assert_eq!(response.status, Some(Status::Ok));
        let data = response.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["id"], "ent1");
        assert_eq!(
            response.access.unwrap().status,
            AccessStatus::Partially
        );
        assert!(response.warning.is_some());
    }

    #[test]
    fn test_refused_becomes_noaccess() {
        let action = response_action(
            json!([{ "$type": "secret", "id": "s1" }]),
            Some(Ident::with_id("johnf")),
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let response = result.response.unwrap();

        assert_eq!(response.status, Some(Status::Noaccess));
        assert_eq!(response.reason.as_deref(), Some("ALLOW_NONE"));
        assert_eq!(response.origin.as_deref(), Some("auth:data"));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_ident_from_field_matches_per_item() {
        let action = response_action(
            json!([
                { "$type": "user", "id": "johnf" },
                { "$type": "user", "id": "katyf" }
            ]),
            Some(Ident::with_id("johnf")),
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let data = result.response.unwrap().data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["id"], "johnf");
    }

    #[test]
    fn test_role_from_field_matches_per_item() {
        let action = response_action(
            json!([
                { "$type": "note", "id": "n1", "requiredRole": "editor" },
                { "$type": "note", "id": "n2", "requiredRole": "admin" }
            ]),
            Some(Ident::with_id("johnf").add_role("editor")),
        );
        let result = authorize_data_from_service(&schemas(), action, false);
        let data = result.response.unwrap().data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["id"], "n1");
    }

    #[test]
    fn test_raw_data_gated_by_allow_raw() {
        let refused = authorize_data_from_service(
            &schemas(),
            response_action(json!("a raw string"), None),
            false,
        );
        let response = refused.response.unwrap();
        assert_eq!(response.status, Some(Status::Noaccess));
        assert_eq!(response.reason.as_deref(), Some("RAW_DATA"));

        let granted = authorize_data_from_service(
            &schemas(),
            response_action(json!("a raw string"), None),
            true,
        );
        assert_eq!(granted.response.unwrap().status, Some(Status::Ok));
    }

    #[test]
    fn test_to_service_refusal_blocks_request() {
        let mut action = Action::new("SET").with_payload(
            Payload::for_type("secret")
                .with_data(json!([{ "$type": "secret", "id": "s1" }])),
        );
        action.meta.ident = Some(Ident::with_id("johnf"));

        let result = authorize_data_to_service(&schemas(), action, false);
        assert_eq!(result.status(), Some(Status::Noaccess));
        assert!(result.payload.data.is_none());
    }

    #[test]
    fn test_to_service_partial_filters_payload() {
        let mut action = Action::new("SET").with_payload(Payload::for_type("entry").with_data(
            json!([
                { "$type": "entry", "id": "ent1" },
                { "$type": "secret", "id": "s1" }
            ]),
        ));
        action.meta.ident = Some(Ident::with_id("johnf"));

        let result = authorize_data_to_service(&schemas(), action, false);
        assert_eq!(result.status(), None, "partial outcome must not set a status");
        let data = result.payload.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_errored_response_passes_through() {
        let action = response_action(json!([{ "$type": "secret" }]), None)
            .set_error("Upstream failed", "service:entries");
        let result = authorize_data_from_service(&schemas(), action, false);
        assert_eq!(result.status(), Some(Status::Error));
    }

    #[test]
    fn test_empty_array_is_granted() {
        let action = response_action(json!([]), None);
        let result = authorize_data_from_service(&schemas(), action, false);
        let response = result.response.unwrap();
        assert_eq!(response.status, Some(Status::Ok));
        assert_eq!(response.data.unwrap(), json!([]));
    }
}
