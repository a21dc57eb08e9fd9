//! Endpoints: matchable, direction-aware mutation units.
//!
//! An endpoint binds one route definition to a mutator. Endpoints are
//! immutable after construction and pre-sorted once per service so more
//! specific endpoints are evaluated before less specific ones; matching
//! proceeds top to bottom and the first full match wins.

use iris_core::{Action, MutateError, Mutator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::r#match::MatchCriteria;
use crate::transporter::TransporterOptions;

/// Definition of an endpoint, loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointDef {
    /// Endpoint id, used by explicit endpoint overrides on actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Criteria deciding which actions this endpoint serves.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub r#match: Option<MatchCriteria>,
    /// Endpoint options, merged over the service options.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: TransporterOptions,
    /// Name of the mutator applied by this endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<String>,
    /// Allow untyped request data through item-level authorization.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_raw_request: bool,
    /// Allow untyped response data through item-level authorization.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_raw_response: bool,
    /// Restrict request mutation to explicitly-mapped fields.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub send_no_defaults: bool,
    /// Restrict response mutation to explicitly-mapped fields.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_no_defaults: bool,
}

/// Sorts endpoint definitions by descending match specificity.
///
/// The sort is stable: endpoints with equal specificity keep their
/// declaration order, which makes endpoint selection deterministic.
#[must_use]
pub fn sort_by_specificity(mut defs: Vec<EndpointDef>) -> Vec<EndpointDef> {
    defs.sort_by_key(|def| {
        std::cmp::Reverse(def.r#match.as_ref().map_or(0, MatchCriteria::specificity))
    });
    defs
}

/// A matchable, direction-aware mutation unit bound to one route.
///
/// Immutable after construction.
pub struct Endpoint {
    /// Endpoint id, when declared.
    pub id: Option<String>,
    r#match: MatchCriteria,
    /// Resolved options: service options merged with endpoint options,
    /// prepared by the transporter.
    pub options: TransporterOptions,
    mutator: Option<Arc<dyn Mutator>>,
    /// Allow untyped request data through item-level authorization.
    pub allow_raw_request: bool,
    /// Allow untyped response data through item-level authorization.
    pub allow_raw_response: bool,
    send_no_defaults: bool,
    return_no_defaults: bool,
}

impl Endpoint {
    /// Creates an endpoint from its definition.
    ///
    /// `options` are the already-merged and transporter-prepared
    /// options; `mutator` is the resolved mutator, when the definition
    /// names one.
    #[must_use]
    pub fn new(
        def: EndpointDef,
        options: TransporterOptions,
        mutator: Option<Arc<dyn Mutator>>,
    ) -> Self {
        Self {
            id: def.id,
            r#match: def.r#match.unwrap_or_default(),
            options,
            mutator,
            allow_raw_request: def.allow_raw_request,
            allow_raw_response: def.allow_raw_response,
            send_no_defaults: def.send_no_defaults,
            return_no_defaults: def.return_no_defaults,
        }
    }

    /// Returns the match criteria of this endpoint.
    #[must_use]
    pub fn match_criteria(&self) -> &MatchCriteria {
        &self.r#match
    }

    /// Returns `true` when this endpoint serves the given action.
    ///
    /// An explicit endpoint id on the action payload overrides
    /// criteria matching entirely.
    #[must_use]
    pub fn is_match(&self, action: &Action, is_incoming: bool) -> bool {
        match &action.payload.endpoint {
            Some(id) => self.id.as_deref() == Some(id.as_str()),
            None => self.r#match.is_match(action, is_incoming),
        }
    }

    /// Applies this endpoint's mutation to the request side.
    ///
    /// Outgoing requests run the reverse mapping (internal shape to
    /// service shape); incoming requests run the forward mapping.
    pub async fn mutate_request(
        &self,
        action: Action,
        is_incoming: bool,
    ) -> Result<Action, MutateError> {
        self.mutate(action, is_incoming, self.send_no_defaults).await
    }

    /// Applies this endpoint's mutation to the response side.
    ///
    /// Responses to outgoing requests run the forward mapping; responses
    /// to incoming requests run the reverse mapping.
    pub async fn mutate_response(
        &self,
        action: Action,
        is_incoming: bool,
    ) -> Result<Action, MutateError> {
        self.mutate(action, !is_incoming, self.return_no_defaults)
            .await
    }

    /// Runs the mutator over the whole action envelope.
    ///
    /// The action type and meta are restored afterwards; mutators map
    /// payloads and responses, never dispatch control state.
    async fn mutate(
        &self,
        action: Action,
        from_service: bool,
        only_mapped: bool,
    ) -> Result<Action, MutateError> {
        let Some(mutator) = &self.mutator else {
            return Ok(action);
        };

        let action_type = action.action_type.clone();
        let meta = action.meta.clone();

        let value = serde_json::to_value(&action)
            .map_err(|err| MutateError::Failed(err.to_string()))?;
        let mutated = match (from_service, only_mapped) {
            (true, false) => mutator.apply(value).await?,
            (true, true) => mutator.apply_only_mapped(value).await?,
            (false, false) => mutator.apply_rev(value).await?,
            (false, true) => mutator.apply_rev_only_mapped(value).await?,
        };

        let mut action: Action = serde_json::from_value(mutated)
            .map_err(|err| MutateError::Failed(err.to_string()))?;
        action.action_type = action_type;
        action.meta = meta;
        Ok(action)
    }
}

/// Selects the best-matching endpoint for an action.
///
/// Endpoints must already be sorted by specificity; the first match
/// wins. Returns `None` when nothing matches — callers produce the
/// `badrequest` response themselves.
#[must_use]
pub fn endpoint_from_action<'a>(
    endpoints: &'a [Endpoint],
    action: &Action,
    is_incoming: bool,
) -> Option<&'a Endpoint> {
    endpoints
        .iter()
        .find(|endpoint| endpoint.is_match(action, is_incoming))
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("match", &self.r#match)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::{BoxFuture, NoopMutator, Payload};
    use serde_json::json;

    fn endpoint_with_match(id: Option<&str>, r#match: Value) -> Endpoint {
        Endpoint::new(
            EndpointDef {
                id: id.map(ToString::to_string),
                r#match: Some(serde_json::from_value(r#match).unwrap()),
                ..EndpointDef::default()
            },
            TransporterOptions::new(),
            None,
        )
    }

    #[test]
    fn test_sorts_more_specific_first() {
        let defs: Vec<EndpointDef> = serde_json::from_value(json!([
            { "id": "loose" },
            { "id": "tight", "match": { "type": "entry", "scope": "member" } },
            { "id": "middling", "match": { "type": "entry" } }
        ]))
        .unwrap();

        let sorted = sort_by_specificity(defs);
        let ids: Vec<_> = sorted.iter().map(|def| def.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["tight", "middling", "loose"]);
    }

    #[test]
    fn test_stable_sort_keeps_declaration_order_on_ties() {
        let defs: Vec<EndpointDef> = serde_json::from_value(json!([
            { "id": "first", "match": { "type": "entry" } },
            { "id": "second", "match": { "scope": "collection" } }
        ]))
        .unwrap();

        let sorted = sort_by_specificity(defs);
        let ids: Vec<_> = sorted.iter().map(|def| def.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_first_match_wins() {
        let endpoints = vec![
            endpoint_with_match(Some("member"), json!({ "type": "entry", "scope": "member" })),
            endpoint_with_match(Some("all"), json!({ "type": "entry" })),
        ];

        let one = Action::new("GET").with_payload(Payload::for_type("entry").with_id("ent1"));
        let found = endpoint_from_action(&endpoints, &one, false).unwrap();
        assert_eq!(found.id.as_deref(), Some("member"));

        let collection = Action::new("GET").with_payload(Payload::for_type("entry"));
        let found = endpoint_from_action(&endpoints, &collection, false).unwrap();
        assert_eq!(found.id.as_deref(), Some("all"));
    }

    #[test]
    fn test_explicit_endpoint_id_overrides_matching() {
        let endpoints = vec![
            endpoint_with_match(Some("special"), json!({ "type": "user" })),
            endpoint_with_match(Some("all"), json!({})),
        ];

        let mut action = Action::new("GET").with_payload(Payload::for_type("entry"));
        action.payload.endpoint = Some("special".to_string());
        let found = endpoint_from_action(&endpoints, &action, false).unwrap();
        assert_eq!(found.id.as_deref(), Some("special"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let endpoints = vec![endpoint_with_match(None, json!({ "type": "user" }))];
        let action = Action::new("GET").with_payload(Payload::for_type("entry"));
        assert!(endpoint_from_action(&endpoints, &action, false).is_none());
    }

    #[tokio::test]
    async fn test_mutate_without_mutator_is_identity() {
        let endpoint = endpoint_with_match(None, json!({}));
        let action = Action::new("GET").with_payload(Payload::for_type("entry"));
        let mutated = endpoint.mutate_request(action.clone(), false).await.unwrap();
        assert_eq!(mutated, action);
    }

    #[tokio::test]
    async fn test_mutate_restores_type_and_meta() {
        struct TypeClobberingMutator;

        impl Mutator for TypeClobberingMutator {
            fn apply<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
                Box::pin(async move {
                    let mut value = value;
                    value["type"] = json!("CLOBBERED");
                    value["meta"] = json!({ "authorized": false });
                    Ok(value)
                })
            }

            fn apply_rev<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
                self.apply(value)
            }
        }

        let endpoint = Endpoint::new(
            EndpointDef::default(),
            TransporterOptions::new(),
            Some(Arc::new(TypeClobberingMutator)),
        );

        let mut action = Action::new("GET");
        action.meta.authorized = true;
        let mutated = endpoint.mutate_request(action, false).await.unwrap();
        assert_eq!(mutated.action_type, "GET");
        assert!(mutated.meta.authorized);
    }

    #[tokio::test]
    async fn test_noop_mutator_roundtrip() {
        let endpoint = Endpoint::new(
            EndpointDef::default(),
            TransporterOptions::new(),
            Some(Arc::new(NoopMutator)),
        );

        let action = Action::new("GET").with_payload(
            Payload::for_type("entry").with_data(json!([{ "id": "ent1" }])),
        );
        let out = endpoint.mutate_request(action.clone(), false).await.unwrap();
        let back = endpoint.mutate_response(out, false).await.unwrap();
        assert_eq!(back.payload, action.payload);
    }
}
