//! Handler error type.
//!
//! Handlers return `Result<Response, HandlerError>`. A returned error is
//! caught by the dispatcher and converted into a `Response` with status
//! `error` and an origin tag identifying the handler; it never escapes
//! the dispatch call.

use thiserror::Error;

/// Result type alias for action handlers.
pub type HandlerResult = Result<crate::Response, HandlerError>;

/// An error raised inside an action handler.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl HandlerError {
    /// Creates a handler error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error wrapping an underlying error.
    pub fn with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
