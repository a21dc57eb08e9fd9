//! The authenticator contract.
//!
//! An authenticator knows how to obtain credentials for a service and
//! how to represent them for a transporter, either as a header map or
//! as a structured object. Concrete authenticators (token, OAuth2,
//! anonymous) live outside this crate.

use iris_core::{Action, BoxFuture, Ident};
use serde_json::Value;
use std::collections::HashMap;

/// Free-form authenticator options from the auth definition.
pub type AuthOptions = serde_json::Map<String, Value>;

/// The outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Credentials were obtained.
    Granted,
    /// The service refused the credentials.
    Refused,
    /// The attempt failed for another reason.
    Error,
}

/// An authentication result, cached per logical session.
#[derive(Debug, Clone, PartialEq)]
pub struct Authentication {
    /// The outcome of the attempt.
    pub status: AuthStatus,
    /// Failure description for non-granted outcomes.
    pub error: Option<String>,
    /// The obtained credentials, when granted.
    pub credentials: serde_json::Map<String, Value>,
}

impl Authentication {
    /// Creates a granted authentication with the given credentials.
    #[must_use]
    pub fn granted(credentials: serde_json::Map<String, Value>) -> Self {
        Self {
            status: AuthStatus::Granted,
            error: None,
            credentials,
        }
    }

    /// Creates a refused authentication.
    #[must_use]
    pub fn refused(error: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Refused,
            error: Some(error.into()),
            credentials: serde_json::Map::new(),
        }
    }

    /// Creates a failed authentication.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Error,
            error: Some(error.into()),
            credentials: serde_json::Map::new(),
        }
    }

    /// Returns `true` when credentials were obtained.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.status == AuthStatus::Granted
    }
}

/// Obtains and represents credentials for a service.
pub trait Authenticator: Send + Sync + 'static {
    /// Authenticates against the service.
    ///
    /// `action` is the action triggering the authentication, when one
    /// is available (listening setups authenticate without an action).
    fn authenticate<'a>(
        &'a self,
        options: &'a AuthOptions,
        action: Option<&'a Action>,
    ) -> BoxFuture<'a, Authentication>;

    /// Returns `true` when a previous authentication is still valid.
    fn is_authenticated(
        &self,
        authentication: &Authentication,
        options: &AuthOptions,
        action: Option<&Action>,
    ) -> bool;

    /// Represents the credentials as request headers.
    fn as_headers(&self, authentication: &Authentication) -> HashMap<String, String> {
        authentication
            .credentials
            .iter()
            .filter_map(|(key, value)| {
                value.as_str().map(|value| (key.clone(), value.to_string()))
            })
            .collect()
    }

    /// Represents the credentials as a structured object.
    fn as_object(&self, authentication: &Authentication) -> Value {
        Value::Object(authentication.credentials.clone())
    }

    /// Validates an incoming authentication and resolves the caller
    /// identity it proves.
    ///
    /// Authenticators without incoming support keep the default, which
    /// rejects every validation.
    fn validate<'a>(
        &'a self,
        _authentication: &'a Authentication,
        _options: &'a AuthOptions,
        _action: Option<&'a Action>,
    ) -> BoxFuture<'a, Result<Ident, String>> {
        Box::pin(async { Err("Authenticator does not support validation".to_string()) })
    }
}
