//! Canned definitions for tests.
//!
//! The shapes mirror the `entries`/`users` setups used across the Iris
//! test suites: an `entry` schema held by an `entries` service with
//! member and collection endpoints, and a `user` schema guarded by
//! role and ident rules.

use serde_json::{json, Value};

/// Schema definition for the `entry` type, open to everyone.
#[must_use]
pub fn entry_schema_def() -> Value {
    json!({
        "id": "entry",
        "plural": "entries",
        "service": "entries",
        "shape": { "title": "string", "text": "string", "author": "string" },
        "access": "all"
    })
}

/// Schema definition for the `user` type, requiring authentication and
/// restricting items to their owner.
#[must_use]
pub fn user_schema_def() -> Value {
    json!({
        "id": "user",
        "service": "users",
        "shape": { "name": "string", "role": "string" },
        "access": {
            "identFromField": "id",
            "actions": { "GET": { "allow": "auth" } }
        }
    })
}

/// Sample entry items in the internal (cast) shape.
#[must_use]
pub fn entry_items() -> Value {
    json!([
        { "$type": "entry", "id": "ent1", "title": "Entry 1" },
        { "$type": "entry", "id": "ent2", "title": "Entry 2" }
    ])
}

/// A complete definition document: the `entry` schema plus an
/// `entries` service with `member` and `collection` endpoints over the
/// `mock` transporter.
#[must_use]
pub fn entries_definitions() -> Value {
    json!({
        "schemas": [entry_schema_def()],
        "services": [{
            "id": "entries",
            "transporter": "mock",
            "options": { "uri": "http://api.test/entries" },
            "endpoints": [
                { "id": "member", "match": { "type": "entry", "scope": "member" } },
                { "id": "collection", "match": { "type": "entry", "scope": "collection" } }
            ]
        }]
    })
}
