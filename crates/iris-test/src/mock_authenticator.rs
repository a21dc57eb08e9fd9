//! A mock authenticator.

use iris_core::{Action, BoxFuture, Ident};
use iris_service::{AuthOptions, Authentication, Authenticator};
use serde_json::Value;

/// An authenticator that grants or refuses unconditionally.
///
/// Granting produces a `token` credential from the `token` option, or
/// `t0k3n` when none is configured. `validate()` resolves an identity
/// from the `ident` option.
pub struct MockAuthenticator {
    grant: bool,
}

impl MockAuthenticator {
    /// Creates an authenticator that grants every attempt.
    #[must_use]
    pub fn granting() -> Self {
        Self { grant: true }
    }

    /// Creates an authenticator that refuses every attempt.
    #[must_use]
    pub fn refusing() -> Self {
        Self { grant: false }
    }
}

impl Authenticator for MockAuthenticator {
    fn authenticate<'a>(
        &'a self,
        options: &'a AuthOptions,
        _action: Option<&'a Action>,
    ) -> BoxFuture<'a, Authentication> {
        Box::pin(async move {
            if self.grant {
                let token = options
                    .get("token")
                    .and_then(Value::as_str)
                    .unwrap_or("t0k3n");
                let mut credentials = serde_json::Map::new();
                credentials.insert("token".to_string(), Value::String(token.to_string()));
                Authentication::granted(credentials)
            } else {
                Authentication::refused("Mock says no")
            }
        })
    }

    fn is_authenticated(
        &self,
        authentication: &Authentication,
        _options: &AuthOptions,
        _action: Option<&Action>,
    ) -> bool {
        authentication.is_granted()
    }

    fn validate<'a>(
        &'a self,
        _authentication: &'a Authentication,
        options: &'a AuthOptions,
        _action: Option<&'a Action>,
    ) -> BoxFuture<'a, Result<Ident, String>> {
        Box::pin(async move {
            options
                .get("ident")
                .and_then(Value::as_str)
                .map(Ident::with_id)
                .ok_or_else(|| "No ident configured".to_string())
        })
    }
}
