//! Caller identity.
//!
//! An [`Ident`] is the resolved identity of the caller of a dispatch. It
//! is attached under `action.meta.ident` and is immutable input for a
//! single dispatch. A `root` identity bypasses all schema-based
//! authorization.

use serde::{Deserialize, Serialize};

/// The resolved caller identity used for authorization decisions.
///
/// # Example
///
/// ```
/// use iris_core::Ident;
///
/// let ident = Ident::with_id("johnf").add_role("editor");
/// assert!(!ident.is_root());
/// assert!(ident.has_role("editor"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ident {
    /// The identity id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Root identities bypass all schema-based authorization.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub root: bool,
    /// Roles held by this identity.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Tokens associated with this identity.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
}

impl Ident {
    /// Creates an identity with the given id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Creates a root identity, bypassing all authorization.
    #[must_use]
    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    /// Adds a role to this identity.
    #[must_use]
    pub fn add_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Adds a token to this identity.
    #[must_use]
    pub fn add_token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    /// Returns `true` if this is a root identity.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Returns `true` if this identity holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// This never returns tokens or other sensitive values.
    #[must_use]
    pub fn log_id(&self) -> String {
        if self.root {
            "root".to_string()
        } else {
            match &self.id {
                Some(id) => format!("ident:{id}"),
                None => "anonymous".to_string(),
            }
        }
    }
}
