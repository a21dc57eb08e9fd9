//! The response side of an action envelope.
//!
//! A [`Response`] carries the terminal [`Status`] of a dispatch leg,
//! the returned data, and failure details. Pipeline stages that fail
//! convert their failures locally into a `Response` with
//! `Status::Error` and an `origin` tag identifying the stage, per the
//! propagation policy: errors never escape a stage uncaught.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ident::Ident;
use crate::status::Status;

/// Aggregate outcome of item-level data authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    /// All items passed authorization.
    Granted,
    /// Some items passed; the rest were dropped from the result.
    Partially,
    /// No items passed. The response status becomes `noaccess`.
    Refused,
}

/// Access annotation set by item-level data authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    /// The aggregate authorization outcome.
    pub status: AccessStatus,
    /// The identity the decision was made for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident: Option<Ident>,
    /// The scheme that produced the decision, e.g. `data` or `raw`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// Paging descriptors for continuing a listing in either direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paging {
    /// Payload fragment to dispatch for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Value>,
    /// Payload fragment to dispatch for the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Value>,
}

/// The result of dispatching an [`Action`](crate::Action).
///
/// `status` is the primary control value: once it holds a value, the
/// dispatch and service pipelines short-circuit further processing for
/// that leg. `None` means "no outcome yet" and is never a valid terminal
/// state for the response returned to the original caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Response {
    /// The terminal status, or `None` while the leg is still pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// The returned data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure description for error statuses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable reason code, e.g. an authorization refusal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Non-fatal warning attached to an otherwise successful response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Paging descriptors when the service supports continuation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    /// Extra parameters returned by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, Value>>,
    /// Item-level authorization annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    /// Tag identifying which pipeline stage produced a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Response {
    /// Creates a successful response with the given data.
    #[must_use]
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            status: Some(Status::Ok),
            data,
            ..Self::default()
        }
    }

    /// Creates a response with the given status and no other content.
    #[must_use]
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Creates an error response with `Status::Error` and an origin tag.
    #[must_use]
    pub fn error(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::error_with_status(message, origin, Status::Error)
    }

    /// Creates an error response with an explicit status and origin tag.
    #[must_use]
    pub fn error_with_status(
        message: impl Into<String>,
        origin: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            status: Some(status),
            error: Some(message.into()),
            origin: Some(origin.into()),
            ..Self::default()
        }
    }

    /// Creates a `noaccess` response with the given reason code.
    #[must_use]
    pub fn noaccess(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Noaccess),
            error: Some(message.into()),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when the response holds a terminal status.
    #[must_use]
    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    /// Returns `true` when the status represents success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(Status::is_success)
    }

    /// Sets the origin tag unless one is already present.
    ///
    /// The first stage to tag a failing response wins; later stages must
    /// not overwrite where the failure actually happened.
    #[must_use]
    pub fn set_origin(mut self, origin: impl Into<String>) -> Self {
        if self.origin.is_none() && self.status.is_some_and(Status::is_error) {
            self.origin = Some(origin.into());
        }
        self
    }

    /// Replaces the status, keeping all other fields.
    #[must_use]
    pub fn map_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}
