//! The action envelope.
//!
//! An [`Action`] is the uniform request/response envelope dispatched
//! through the system. Actions are immutable by convention: every
//! transformation step produces a new `Action` value, and no step may
//! silently discard an already-set response status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ident::Ident;
use crate::response::Response;

/// A single value or a list of values.
///
/// Payload `type` and `id` fields accept both forms on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Returns the values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }

    /// Returns the first value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Returns `true` when this holds a list (even a list of one).
    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` when this holds an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

/// The request side of an action envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payload {
    /// The data type(s) this request concerns.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<OneOrMany<String>>,
    /// The id(s) of the requested item(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<OneOrMany<String>>,
    /// The request data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The service this action arrived from, set on incoming dispatches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_service: Option<String>,
    /// Explicit target service, overriding type-based resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_service: Option<String>,
    /// Explicit endpoint id, overriding endpoint matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Free-form request parameters.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, Value>,
}

impl Payload {
    /// Creates a payload for the given data type.
    #[must_use]
    pub fn for_type(r#type: impl Into<OneOrMany<String>>) -> Self {
        Self {
            r#type: Some(r#type.into()),
            ..Self::default()
        }
    }

    /// Sets the item id(s).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<OneOrMany<String>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the request data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the target service.
    #[must_use]
    pub fn with_target_service(mut self, service: impl Into<String>) -> Self {
        self.target_service = Some(service.into());
        self
    }

    /// Sets a request parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Returns the requested types as string slices.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        self.r#type
            .as_ref()
            .map(|t| t.as_slice().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the requested ids as string slices.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.id
            .as_ref()
            .map(|i| i.as_slice().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Metadata travelling with an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    /// Unique id of this action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Correlation id linking queued actions to their origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// The resolved caller identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident: Option<Ident>,
    /// When set, dispatch reroutes the action to the queue service.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub queue: bool,
    /// Timestamp stamped when the action was handed to the queue service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    /// Credentials applied by the service auth before sending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
    /// Endpoint options resolved for this action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// Set by action-level authorization when the action may be sent.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub authorized: bool,
}

/// The uniform request/response envelope dispatched through the system.
///
/// # Example
///
/// ```
/// use iris_core::{Action, Ident, Payload};
///
/// let action = Action::new("GET")
///     .with_payload(Payload::for_type("entry").with_id("ent1"))
///     .with_ident(Ident::root());
///
/// assert_eq!(action.action_type, "GET");
/// assert!(action.ident().is_some_and(iris_core::Ident::is_root));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Action {
    /// The action type, selecting a handler.
    #[serde(rename = "type")]
    pub action_type: String,
    /// The request side of the envelope.
    pub payload: Payload,
    /// The response side, absent until a pipeline stage produces one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    /// Metadata travelling with the action.
    #[serde(skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Meta {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Action {
    /// Creates an action of the given type with an empty payload.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Sets the caller identity on the metadata.
    #[must_use]
    pub fn with_ident(mut self, ident: Ident) -> Self {
        self.meta.ident = Some(ident);
        self
    }

    /// Flags the action for queueing.
    #[must_use]
    pub fn with_queue(mut self) -> Self {
        self.meta.queue = true;
        self
    }

    /// Returns the caller identity, if any.
    #[must_use]
    pub fn ident(&self) -> Option<&Ident> {
        self.meta.ident.as_ref()
    }

    /// Returns `true` when action-level authorization has passed.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.meta.authorized
    }

    /// Returns the terminal status of the response, if one is set.
    #[must_use]
    pub fn status(&self) -> Option<crate::Status> {
        self.response.as_ref().and_then(|response| response.status)
    }

    /// Returns a new action with the given response set.
    #[must_use]
    pub fn set_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Returns a new action carrying an error response with an origin tag.
    #[must_use]
    pub fn set_error(mut self, message: impl Into<String>, origin: impl Into<String>) -> Self {
        let base = self.response.take().unwrap_or_default();
        self.set_response(Response {
            status: Some(crate::Status::Error),
            error: Some(message.into()),
            origin: Some(origin.into()),
            ..base
        })
    }

    /// Returns a new action with the payload data replaced.
    #[must_use]
    pub fn set_payload_data(mut self, data: Option<Value>) -> Self {
        self.payload.data = data;
        self
    }

    /// Returns a new action with the response data replaced, keeping any
    /// existing response fields.
    #[must_use]
    pub fn set_response_data(mut self, data: Option<Value>) -> Self {
        let mut response = self.response.take().unwrap_or_default();
        response.data = data;
        self.set_response(response)
    }
}
