//! # Iris Service
//!
//! The per-service request/response pipeline of the Iris integration
//! middleware.
//!
//! A [`Service`] is the runtime binding of one external system: it owns
//! exactly one [`Transporter`], one [`Connection`] (when a transporter
//! is configured), optional [`Auth`]s for outgoing and incoming traffic,
//! and an ordered, pre-sorted list of [`Endpoint`]s. The service exposes
//! the pipeline operations handlers drive: endpoint selection,
//! action-level authorization, direction-aware mutation, send, listen
//! and close.

#![doc(html_root_url = "https://docs.rs/iris-service/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod authenticator;
mod connection;
mod endpoint;
mod r#match;
mod service;
mod transporter;

pub use auth::Auth;
pub use authenticator::{AuthOptions, AuthStatus, Authentication, Authenticator};
pub use connection::{Connection, ConnectionStatus};
pub use endpoint::{Endpoint, EndpointDef};
pub use r#match::{FilterDef, MatchCriteria, Scope};
pub use service::{AuthRef, Service, ServiceDef, ServiceError, ServiceResources};
pub use transporter::{
    noop_emit, AuthRepresentation, DispatchFn, EmitFn, TransportError, Transporter,
    TransporterOptions,
};
