//! Endpoint match criteria.
//!
//! Criteria decide which endpoint serves an action: action type(s),
//! scope (`member`/`members`/`collection`), required or forbidden
//! params, arbitrary filter predicates on dot-paths into the action,
//! and the `incoming` flag partitioning endpoints by traffic direction.

use iris_core::{Action, OneOrMany};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The id scope an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A single item, addressed by one id.
    Member,
    /// Several items, addressed by a list of ids in one request.
    Members,
    /// The whole collection, no id.
    Collection,
}

/// A filter predicate on a dot-path into the action.
///
/// `const` requires the value at the path to equal the given constant;
/// `exists` requires the path to be present (or absent, for `false`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterDef {
    /// Required constant value at the path.
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub r#const: Option<Value>,
    /// Required presence (`true`) or absence (`false`) of the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

/// Criteria deciding whether an endpoint serves an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchCriteria {
    /// Action type(s) this endpoint serves.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<OneOrMany<String>>,
    /// Id scope this endpoint serves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// Required (`true`) or forbidden (`false`) param keys.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, bool>,
    /// Filter predicates keyed by dot-path into the action.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub filters: HashMap<String, FilterDef>,
    /// Set for endpoints serving requests arriving from the service.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub incoming: bool,
}

impl MatchCriteria {
    /// Returns the specificity rank of these criteria.
    ///
    /// Specificity is the number of declared criteria; endpoints are
    /// sorted so more specific ones are evaluated first, with ties
    /// broken by declaration order.
    #[must_use]
    pub fn specificity(&self) -> usize {
        usize::from(self.r#type.is_some())
            + usize::from(self.scope.is_some())
            + self.params.len()
            + self.filters.len()
    }

    /// Returns `true` when the criteria hold for the given action.
    ///
    /// The `incoming` partition is checked first: an outbound match
    /// never considers incoming endpoints and vice versa.
    #[must_use]
    pub fn is_match(&self, action: &Action, is_incoming: bool) -> bool {
        self.incoming == is_incoming
            && self.matches_type(action)
            && self.matches_scope(action)
            && self.matches_params(action)
            && self.matches_filters(action)
    }

    fn matches_type(&self, action: &Action) -> bool {
        let Some(declared) = &self.r#type else {
            return true;
        };
        let requested = action.payload.types();
        !requested.is_empty()
            && requested
                .iter()
                .all(|r#type| declared.as_slice().iter().any(|t| t == r#type))
    }

    fn matches_scope(&self, action: &Action) -> bool {
        match self.scope {
            None => true,
            Some(Scope::Member) => action
                .payload
                .id
                .as_ref()
                .is_some_and(|id| !id.is_many() && !id.is_empty()),
            Some(Scope::Members) => action.payload.id.as_ref().is_some_and(OneOrMany::is_many),
            Some(Scope::Collection) => action.payload.id.is_none(),
        }
    }

    fn matches_params(&self, action: &Action) -> bool {
        self.params.iter().all(|(key, required)| {
            let present = action.payload.params.contains_key(key);
            present == *required
        })
    }

    fn matches_filters(&self, action: &Action) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let Ok(action_value) = serde_json::to_value(action) else {
            return false;
        };
        self.filters
            .iter()
            .all(|(path, filter)| filter_holds(&action_value, path, filter))
    }
}

fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |value, key| value.get(key))
}

fn filter_holds(action: &Value, path: &str, filter: &FilterDef) -> bool {
    let value = value_at_path(action, path);

    if let Some(expected) = &filter.r#const {
        if value != Some(expected) {
            return false;
        }
    }
    if let Some(exists) = filter.exists {
        if value.is_some() != exists {
            return false;
        }
    }
    true
}
