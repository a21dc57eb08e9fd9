//! # Iris
//!
//! **Integration middleware for the Themis Platform**
//!
//! Iris accepts uniform typed actions and routes them, through
//! pluggable transporters, to heterogeneous external services, applying
//! schema-driven authorization and data transformation along the way.
//! One data model can be exposed and consumed across many protocols
//! without each caller knowing the specifics of any backend.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use iris::prelude::*;
//!
//! let instance = iris::create(definitions, resources, vec![])?;
//! let response = instance
//!     .dispatch(Action::new("GET").with_payload(Payload::for_type("entry")))
//!     .await;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Action → Dispatcher (middleware onion) → Handler
//!                                            ↓
//!          Service: endpoint match → authorize → mutate → send
//!                                            ↓
//!          Transporter ──────────────→ external service
//! ```
//!
//! The dispatcher composes user middleware around a typed handler
//! registry; handlers drive the per-service pipeline; services own
//! their transporter, connection, auth and endpoints.

#![doc(html_root_url = "https://docs.rs/iris/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod create;
mod dispatch;
pub mod handlers;
mod queue;
mod registry;

pub use create::{create, AuthDef, DefinitionError, Definitions, Instance, Resources};
pub use dispatch::{
    ActionHandler, Dispatcher, HandlerOptions, HandlerResources, IdentConfig, ProgressFn,
};
pub use registry::ServiceRegistry;

// Re-export the crates making up the public surface
pub use iris_authz as authz;
pub use iris_core as core;
pub use iris_middleware as middleware;
pub use iris_service as service;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use iris::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        create, ActionHandler, Definitions, Dispatcher, HandlerResources, Instance, Resources,
        ServiceRegistry,
    };
    pub use iris_core::{
        Action, HandlerError, HandlerResult, Ident, Meta, Payload, Response, Schema, SchemaDef,
        Status,
    };
    pub use iris_middleware::{Middleware, MiddlewareStack, Next};
    pub use iris_service::{
        Auth, Authenticator, Endpoint, EndpointDef, Service, ServiceDef, Transporter,
    };
}
