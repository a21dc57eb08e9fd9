//! Schemas and access rules.
//!
//! A [`Schema`] describes one data type flowing through the system: its
//! id, the service holding it, an optional field shape used for casting,
//! and the access rules evaluated by the authorization engine.
//!
//! Access rules are keyed per data type and optionally per action verb.
//! At most one authorization outcome is produced per (type, action)
//! evaluation; the first failing rule wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::action::OneOrMany;

/// An access rule, either a shortcut string or a full definition.
///
/// The shortcut form maps onto [`AccessDef::allow`]: `"all"`, `"auth"`
/// and `"none"` are the recognized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessRule {
    /// Shortcut for `{ allow: <value> }`.
    Shortcut(String),
    /// A full access definition.
    Def(AccessDef),
}

impl AccessRule {
    /// Resolves this rule into a concrete [`AccessDef`].
    #[must_use]
    pub fn resolve(&self) -> AccessDef {
        match self {
            Self::Shortcut(allow) => AccessDef {
                allow: Some(allow.clone()),
                ..AccessDef::default()
            },
            Self::Def(def) => def.clone(),
        }
    }
}

/// Schema access definition.
///
/// Declares who may act on a data type. `actions` holds per-verb
/// overrides that replace the base rule for that verb entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessDef {
    /// `"all"` grants everyone, `"auth"` grants any authenticated
    /// identity, anything else (including `"none"`) refuses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
    /// Role(s) of which the identity must hold at least one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<OneOrMany<String>>,
    /// Identity id(s) of which the caller must be one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident: Option<OneOrMany<String>>,
    /// Field on each data item holding the owning identity id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident_from_field: Option<String>,
    /// Field on each data item holding the required role(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_from_field: Option<String>,
    /// Per-verb overrides, keyed by action type.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub actions: HashMap<String, AccessRule>,
}

impl AccessDef {
    /// Returns `true` when this definition declares any access method.
    ///
    /// Services requiring authentication refuse types whose resolved
    /// access declares no method at all.
    #[must_use]
    pub fn has_access_method(&self) -> bool {
        self.allow.is_some()
            || self.role.is_some()
            || self.ident.is_some()
            || self.ident_from_field.is_some()
            || self.role_from_field.is_some()
    }

    /// Returns the required roles as a list.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.role
            .as_ref()
            .map(|r| r.as_slice().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the allowed identity ids as a list.
    #[must_use]
    pub fn idents(&self) -> Vec<&str> {
        self.ident
            .as_ref()
            .map(|i| i.as_slice().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Definition of a schema, loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaDef {
    /// The data type this schema describes.
    pub id: String,
    /// Plural name of the type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    /// The default service holding items of this type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Declared field shape; field name to type name.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub shape: IndexMap<String, String>,
    /// Access rule for this type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessRule>,
}

/// A data type description with access rules and casting.
///
/// Built once from a [`SchemaDef`] at boot and shared read-only.
#[derive(Debug, Clone)]
pub struct Schema {
    /// The data type id.
    pub id: String,
    /// Plural name, defaulting to `<id>s`.
    pub plural: String,
    /// The default service holding items of this type.
    pub service: Option<String>,
    shape: IndexMap<String, String>,
    access: Option<AccessRule>,
}

impl Schema {
    /// Builds a schema from its definition.
    #[must_use]
    pub fn from_def(def: SchemaDef) -> Self {
        let plural = def.plural.unwrap_or_else(|| format!("{}s", def.id));
        Self {
            id: def.id,
            plural,
            service: def.service,
            shape: def.shape,
            access: def.access,
        }
    }

    /// Resolves the access rule in effect for the given action verb.
    ///
    /// A per-verb override replaces the base rule entirely; otherwise the
    /// base rule applies. `None` means the schema declares no access rule
    /// at all.
    #[must_use]
    pub fn access_for_action(&self, action_type: &str) -> Option<AccessDef> {
        let base = self.access.as_ref().map(AccessRule::resolve)?;
        match base.actions.get(action_type) {
            Some(rule) => Some(rule.resolve()),
            None => Some(base),
        }
    }

    /// Casts a data value to this schema's shape.
    ///
    /// Objects are stamped with `$type`, their `id` is coerced to a
    /// string, and when a shape is declared only declared fields are
    /// kept. Arrays are cast item by item; non-object items are passed
    /// through untouched.
    #[must_use]
    pub fn cast(&self, data: Value) -> Value {
        match data {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.cast_item(item)).collect())
            }
            other => self.cast_item(other),
        }
    }

    fn cast_item(&self, item: Value) -> Value {
        let Value::Object(fields) = item else {
            return item;
        };

        let mut cast = serde_json::Map::new();
        cast.insert("$type".to_string(), Value::String(self.id.clone()));

        for (key, value) in fields {
            if key == "$type" {
                continue;
            }
            if key == "id" {
                cast.insert("id".to_string(), coerce_id(value));
                continue;
            }
            if self.shape.is_empty() || self.shape.contains_key(&key) {
                cast.insert(key, value);
            }
        }

        Value::Object(cast)
    }
}

fn coerce_id(value: Value) -> Value {
    match value {
        Value::String(id) => Value::String(id),
        Value::Number(id) => Value::String(id.to_string()),
        other => other,
    }
}
