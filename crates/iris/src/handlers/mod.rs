//! Built-in action handlers.
//!
//! These cover the common verbs: `GET` fetches items, `SET` writes
//! items, `SERVICE` sends an action straight to a named service. All of
//! them drive the per-service pipeline: endpoint selection, action
//! authorization, direction-aware mutation, send.

mod get;
mod send_service;
mod set;

pub use get::GetHandler;
pub use send_service::SendServiceHandler;
pub use set::SetHandler;

use crate::dispatch::ActionHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Returns the built-in handlers, keyed by action type.
#[must_use]
pub fn builtin_handlers() -> HashMap<String, Arc<dyn ActionHandler>> {
    let mut handlers: HashMap<String, Arc<dyn ActionHandler>> = HashMap::new();
    handlers.insert("GET".to_string(), Arc::new(GetHandler));
    handlers.insert("SET".to_string(), Arc::new(SetHandler));
    handlers.insert("SERVICE".to_string(), Arc::new(SendServiceHandler));
    handlers
}

pub(crate) use get::unknown_service_error;
