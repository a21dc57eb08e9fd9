//! # Iris Core
//!
//! Core types for the Iris integration middleware.
//!
//! This crate provides the foundational types used throughout Iris:
//!
//! - [`Action`] - The uniform request/response envelope dispatched through the system
//! - [`Response`] - The terminal result of a dispatch, carrying a [`Status`]
//! - [`Ident`] - The resolved caller identity used for authorization decisions
//! - [`Schema`] - A data type description with access rules and casting
//! - [`Mutator`] - The opaque bidirectional data-transformation contract
//! - [`HandlerError`] - Error type returned by action handlers

#![doc(html_root_url = "https://docs.rs/iris-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod error;
mod ident;
mod mutator;
mod response;
mod schema;
mod status;

pub use action::{Action, Meta, OneOrMany, Payload};
pub use error::{HandlerError, HandlerResult};
pub use ident::Ident;
pub use mutator::{BoxFuture, ComposedMutator, MutateError, Mutator, NoopMutator};
pub use response::{Access, AccessStatus, Paging, Response};
pub use schema::{AccessDef, AccessRule, Schema, SchemaDef};
pub use status::Status;
