//! Structured-logging middleware.
//!
//! Logs every action entering the chain and the status it resolved to.
//! Install it first so it observes the full round trip.

use iris_core::{Action, BoxFuture, Response};

use crate::middleware::{Middleware, Next};

/// Middleware that logs dispatched actions and their outcomes.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Creates a new logging middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(&'a self, action: Action, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let action_type = action.action_type.clone();
            let ident = action
                .ident()
                .map(iris_core::Ident::log_id)
                .unwrap_or_else(|| "anonymous".to_string());
            tracing::debug!(action = %action_type, ident = %ident, "Dispatching action");

            let response = next.run(action).await;

            match response.status {
                Some(status) if status.is_error() => {
                    tracing::warn!(
                        action = %action_type,
                        status = %status,
                        origin = response.origin.as_deref().unwrap_or("unknown"),
                        error = response.error.as_deref().unwrap_or(""),
                        "Action failed"
                    );
                }
                Some(status) => {
                    tracing::debug!(action = %action_type, status = %status, "Action resolved");
                }
                None => {
                    tracing::warn!(action = %action_type, "Action resolved without status");
                }
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MiddlewareStack;
    use iris_core::Status;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_passes_action_and_response_through() {
        let stack = MiddlewareStack::new(vec![Arc::new(LoggingMiddleware::new())]);
        let response = stack
            .process(Action::new("GET"), |_action| {
                Box::pin(async { Response::with_status(Status::Notfound) })
            })
            .await;
        assert_eq!(response.status, Some(Status::Notfound));
    }
}
