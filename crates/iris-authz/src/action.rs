//! Action-level authorization.
//!
//! Evaluates the access rules of every data type an action requests,
//! against the caller identity. The first failing type short-circuits
//! the whole evaluation. Typeless actions always pass; `root`
//! identities bypass every rule.

use iris_core::{AccessDef, Action, Ident, Response, Status};
use serde::{Deserialize, Serialize};

use crate::Schemas;

/// Reason codes produced by a failed action-level authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthReason {
    /// The requested type has no registered schema.
    NoSchema,
    /// The service requires authentication but the schema declares no
    /// access method for this type.
    AccessMethodRequired,
    /// The access rule refuses everyone (`allow` is `none` or unknown).
    AllowNone,
    /// An identity is required but none was present.
    NoIdent,
    /// The identity holds none of the required roles.
    MissingRole,
    /// The identity id is not in the allowed set.
    WrongIdent,
}

impl AuthReason {
    /// Returns the wire-level reason code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoSchema => "NO_SCHEMA",
            Self::AccessMethodRequired => "ACCESS_METHOD_REQUIRED",
            Self::AllowNone => "ALLOW_NONE",
            Self::NoIdent => "NO_IDENT",
            Self::MissingRole => "MISSING_ROLE",
            Self::WrongIdent => "WRONG_IDENT",
        }
    }
}

impl std::fmt::Display for AuthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

struct Refusal {
    reason: AuthReason,
    error: String,
}

fn refused_for_type(reason: AuthReason, r#type: &str) -> Refusal {
    Refusal {
        reason,
        error: format!("Authentication was refused for type '{type}'"),
    }
}

fn required_error(items: &[&str], item_name: &str) -> String {
    let plural = if items.len() > 1 { "s" } else { "" };
    let list = items
        .iter()
        .map(|item| format!("'{item}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Authentication was refused, {item_name}{plural} required: {list}")
}

pub(crate) fn authorize_by_allow(allow: Option<&str>, has_ident: bool) -> Option<AuthReason> {
    match allow {
        None | Some("all") => None,
        Some("auth") => {
            if has_ident {
                None
            } else {
                Some(AuthReason::NoIdent)
            }
        }
        // Including "none"
        Some(_) => Some(AuthReason::AllowNone),
    }
}

pub(crate) fn has_some_role(required: &[&str], ident: Option<&Ident>) -> bool {
    ident.is_some_and(|ident| required.iter().any(|role| ident.has_role(role)))
}

fn authorize_by_one_schema(
    ident: Option<&Ident>,
    schemas: &Schemas,
    r#type: &str,
    action_type: &str,
    require_auth: bool,
) -> Option<Refusal> {
    let Some(schema) = schemas.get(r#type) else {
        return Some(refused_for_type(AuthReason::NoSchema, r#type));
    };

    let access = schema
        .access_for_action(action_type)
        .unwrap_or_else(AccessDef::default);
    if require_auth && !access.has_access_method() {
        return Some(refused_for_type(AuthReason::AccessMethodRequired, r#type));
    }

    if let Some(reason) = authorize_by_allow(access.allow.as_deref(), ident.is_some()) {
        return Some(refused_for_type(reason, r#type));
    }

    let roles = access.roles();
    if !roles.is_empty() && !has_some_role(&roles, ident) {
        return Some(Refusal {
            reason: AuthReason::MissingRole,
            error: required_error(&roles, "role"),
        });
    }

    let idents = access.idents();
    if !idents.is_empty() {
        let id = ident.and_then(|ident| ident.id.as_deref());
        if !id.is_some_and(|id| idents.contains(&id)) {
            return Some(Refusal {
                reason: AuthReason::WrongIdent,
                error: required_error(&idents, "ident"),
            });
        }
    }

    if (access.ident_from_field.is_some() || access.role_from_field.is_some()) && ident.is_none() {
        return Some(refused_for_type(AuthReason::NoIdent, r#type));
    }

    None
}

/// Authorizes an action against the schemas of its requested types.
///
/// Tags the action `meta.authorized` when access is granted; otherwise
/// attaches a `noaccess` response carrying the [`AuthReason`] code of
/// the first failing type. Actions already carrying a non-ok status are
/// passed through unauthorized: an errored leg is never re-evaluated.
#[must_use]
pub fn authorize_action(schemas: &Schemas, require_auth: bool, action: Action) -> Action {
    // Don't authorize an action with an existing error
    if action.status().is_some_and(|status| status != Status::Ok) {
        let mut action = action;
        action.meta.authorized = false;
        return action;
    }

    let ident = action.ident().cloned();
    if ident.as_ref().is_some_and(Ident::is_root) {
        let mut action = action;
        action.meta.authorized = true;
        return action;
    }

    // Requests without type are always allowed
    let refusal = action.payload.types().iter().find_map(|r#type| {
        authorize_by_one_schema(
            ident.as_ref(),
            schemas,
            r#type,
            &action.action_type,
            require_auth,
        )
    });

    match refusal {
        Some(Refusal { reason, error }) => {
            tracing::debug!(
                action = %action.action_type,
                reason = %reason,
                "Action-level authorization refused"
            );
            let mut action = action.set_response(Response {
                status: Some(Status::Noaccess),
                error: Some(error),
                reason: Some(reason.code().to_string()),
                origin: Some("auth:action".to_string()),
                ..Response::default()
            });
            action.meta.authorized = false;
            action
        }
        None => {
            let mut action = action;
            action.meta.authorized = true;
            action
        }
    }
}
