//! Cached service authentication.
//!
//! [`Auth`] wraps a pluggable [`Authenticator`] and caches its result
//! per logical session. Revalidation happens before every send or
//! listen: a cached result is reused only while the authenticator still
//! considers it valid. Authentication failure produces a
//! `noaccess`/`autherror` response, never a panic or error return.

use iris_core::{Action, Response, Status};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::authenticator::{AuthOptions, AuthStatus, Authentication, Authenticator};
use crate::transporter::{AuthRepresentation, Transporter};

/// A configured authentication bound to one or more services.
pub struct Auth {
    id: String,
    authenticator: Arc<dyn Authenticator>,
    options: AuthOptions,
    state: Mutex<Option<Authentication>>,
}

impl Auth {
    /// Creates an auth from its definition parts.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
        options: AuthOptions,
    ) -> Self {
        Self {
            id: id.into(),
            authenticator,
            options,
            state: Mutex::new(None),
        }
    }

    /// Returns the id of this auth.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authenticates, reusing a still-valid cached result.
    ///
    /// Returns `true` when credentials are available afterwards.
    pub async fn authenticate(&self, action: Option<&Action>) -> bool {
        let mut state = self.state.lock().await;

        if let Some(authentication) = state.as_ref() {
            if authentication.is_granted()
                && self
                    .authenticator
                    .is_authenticated(authentication, &self.options, action)
            {
                return true;
            }
        }

        let authentication = self.authenticator.authenticate(&self.options, action).await;
        let granted = authentication.is_granted();
        if !granted {
            tracing::debug!(auth = %self.id, "Authentication attempt was not granted");
        }
        *state = Some(authentication);
        granted
    }

    /// Returns the credentials in the representation the transporter
    /// asks for, or `None` when not granted or not requested.
    pub async fn auth_object(&self, transporter: &dyn Transporter) -> Option<Value> {
        let state = self.state.lock().await;
        let authentication = state.as_ref().filter(|auth| auth.is_granted())?;
        match transporter.authentication()? {
            AuthRepresentation::Headers => {
                let headers = self.authenticator.as_headers(authentication);
                Some(serde_json::to_value(headers).unwrap_or(Value::Null))
            }
            AuthRepresentation::Object => Some(self.authenticator.as_object(authentication)),
        }
    }

    /// Applies the cached credentials to the action's `meta.auth`.
    ///
    /// When the last authentication was not granted, the action gets a
    /// failure response instead and must not be sent.
    pub async fn apply_to_action(&self, mut action: Action, transporter: &dyn Transporter) -> Action {
        let granted = {
            let state = self.state.lock().await;
            state.as_ref().is_some_and(Authentication::is_granted)
        };

        if granted {
            action.meta.auth = self.auth_object(transporter).await;
            action
        } else {
            let response = self.response_from_auth().await;
            action.set_response(response)
        }
    }

    /// Builds the failure response for the current authentication state.
    ///
    /// Refused attempts become `noaccess`; anything else (including a
    /// missing attempt) becomes `autherror`.
    pub async fn response_from_auth(&self) -> Response {
        let state = self.state.lock().await;
        match state.as_ref() {
            Some(authentication) if authentication.status == AuthStatus::Refused => {
                Response::error_with_status(
                    format!(
                        "Authentication attempt for auth '{}' was refused. {}",
                        self.id,
                        authentication.error.as_deref().unwrap_or("")
                    )
                    .trim_end()
                    .to_string(),
                    format!("auth:{}", self.id),
                    Status::Noaccess,
                )
            }
            Some(authentication) => Response::error_with_status(
                format!(
                    "Could not authenticate auth '{}'. {}",
                    self.id,
                    authentication.error.as_deref().unwrap_or("")
                )
                .trim_end()
                .to_string(),
                format!("auth:{}", self.id),
                Status::Autherror,
            ),
            None => Response::error_with_status(
                format!("No authentication attempt for auth '{}'", self.id),
                format!("auth:{}", self.id),
                Status::Autherror,
            ),
        }
    }

    /// Validates an incoming authentication and resolves the identity it
    /// proves.
    pub async fn validate(
        &self,
        authentication: &Authentication,
        action: Option<&Action>,
    ) -> Result<iris_core::Ident, String> {
        self.authenticator
            .validate(authentication, &self.options, action)
            .await
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuthenticator {
        attempts: AtomicUsize,
        grant: bool,
        stays_valid: bool,
    }

    impl Authenticator for CountingAuthenticator {
        fn authenticate<'a>(
            &'a self,
            _options: &'a AuthOptions,
            _action: Option<&'a Action>,
        ) -> BoxFuture<'a, Authentication> {
            Box::pin(async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                if self.grant {
                    let mut credentials = serde_json::Map::new();
                    credentials.insert("token".to_string(), json!("t0k3n"));
                    Authentication::granted(credentials)
                } else {
                    Authentication::refused("Wrong credentials")
                }
            })
        }

        fn is_authenticated(
            &self,
            authentication: &Authentication,
            _options: &AuthOptions,
            _action: Option<&Action>,
        ) -> bool {
            self.stays_valid && authentication.is_granted()
        }
    }

    struct ObjectTransporter;

    impl Transporter for ObjectTransporter {
        fn authentication(&self) -> Option<AuthRepresentation> {
            Some(AuthRepresentation::Object)
        }

        fn connect<'a>(
            &'a self,
            _options: &'a crate::transporter::TransporterOptions,
            _auth: Option<&'a Value>,
            _connection: Option<Value>,
            _emit: &'a crate::transporter::EmitFn,
        ) -> BoxFuture<'a, Result<Option<Value>, crate::transporter::TransportError>> {
            Box::pin(async { Ok(None) })
        }

        fn send<'a>(
            &'a self,
            _action: &'a Action,
            _connection: Option<&'a Value>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async { Response::ok(None) })
        }

        fn disconnect<'a>(&'a self, _connection: Option<Value>) -> BoxFuture<'a, ()> {
            Box::pin(async {})
        }
    }

    fn auth(grant: bool, stays_valid: bool) -> (Arc<CountingAuthenticator>, Auth) {
        let authenticator = Arc::new(CountingAuthenticator {
            attempts: AtomicUsize::new(0),
            grant,
            stays_valid,
        });
        let auth = Auth::new("backend", authenticator.clone(), AuthOptions::new());
        (authenticator, auth)
    }

    #[tokio::test]
    async fn test_caches_granted_result() {
        let (authenticator, auth) = auth(true, true);
        assert!(auth.authenticate(None).await);
        assert!(auth.authenticate(None).await);
        assert_eq!(authenticator.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_revalidates_expired_result() {
        let (authenticator, auth) = auth(true, false);
        assert!(auth.authenticate(None).await);
        assert!(auth.authenticate(None).await);
        assert_eq!(
            authenticator.attempts.load(Ordering::SeqCst),
            2,
            "an invalid cached result must trigger a fresh attempt"
        );
    }

    #[tokio::test]
    async fn test_refused_yields_noaccess_response() {
        let (_, auth) = auth(false, true);
        assert!(!auth.authenticate(None).await);

        let action = auth.apply_to_action(Action::new("GET"), &ObjectTransporter).await;
        let response = action.response.unwrap();
        assert_eq!(response.status, Some(Status::Noaccess));
        assert!(response.error.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_applies_credentials_as_object() {
        let (_, auth) = auth(true, true);
        assert!(auth.authenticate(None).await);

        let action = auth.apply_to_action(Action::new("GET"), &ObjectTransporter).await;
        assert_eq!(action.meta.auth, Some(json!({ "token": "t0k3n" })));
        assert!(action.response.is_none());
    }

    #[tokio::test]
    async fn test_missing_attempt_yields_autherror() {
        let (_, auth) = auth(true, true);
        let response = auth.response_from_auth().await;
        assert_eq!(response.status, Some(Status::Autherror));
    }
}
