//! # Iris Middleware
//!
//! The middleware contract for Iris dispatch pipelines.
//!
//! Middleware wrap the dispatch continuation as an onion: the
//! first-declared middleware is outermost, and each middleware receives
//! a [`Next`] it must run exactly once — or not at all, to
//! short-circuit with its own [`Response`](iris_core::Response).
//!
//! The same stack type is used in two places: the Dispatcher wraps the
//! handler-lookup step, and each Service wraps its transporter send.

#![doc(html_root_url = "https://docs.rs/iris-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod middleware;
pub mod stages;

pub use middleware::{Middleware, MiddlewareStack, Next};
