//! The transporter contract.
//!
//! A transporter is the protocol-specific adapter performing the actual
//! exchange with an external service. Iris consumes transporters only
//! through this trait; concrete implementations (HTTP, queue brokers,
//! databases) live in their own crates.

use iris_core::{Action, BoxFuture, Response};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Free-form transporter options, merged from service and endpoint
/// definitions.
pub type TransporterOptions = serde_json::Map<String, Value>;

/// A dispatch function handed to listening transporters.
///
/// Incoming requests are turned into actions and dispatched through the
/// outer dispatcher via this function.
pub type DispatchFn = Arc<dyn Fn(Action) -> BoxFuture<'static, Response> + Send + Sync>;

/// Event emitter handed to transporters for out-of-band notifications.
pub type EmitFn = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Returns an emitter that discards every event.
#[must_use]
pub fn noop_emit() -> EmitFn {
    Arc::new(|_event, _payload| {})
}

/// Error produced by a failed transporter operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("Could not connect: {0}")]
    Connect(String),
}

/// How a transporter wants credentials represented on the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRepresentation {
    /// As a string-to-string header map.
    Headers,
    /// As a structured credentials object.
    Object,
}

/// The protocol-specific adapter performing the actual network exchange
/// for a service.
///
/// All async methods use boxed futures to keep the trait object-safe;
/// transporters are stored as `Arc<dyn Transporter>` on their service.
pub trait Transporter: Send + Sync + 'static {
    /// How this transporter wants credentials applied to outgoing
    /// actions, or `None` when it handles authentication itself.
    fn authentication(&self) -> Option<AuthRepresentation> {
        None
    }

    /// Resolves and validates options before the service is built.
    ///
    /// Runs once per endpoint at service construction time.
    fn prepare_options(
        &self,
        options: TransporterOptions,
        _service_id: &str,
    ) -> TransporterOptions {
        options
    }

    /// Opens a connection to the remote service.
    ///
    /// `connection` holds the previous connection record, when
    /// reconnecting. Returns the new connection record, or `Ok(None)`
    /// for transporters that do not track connection state.
    fn connect<'a>(
        &'a self,
        options: &'a TransporterOptions,
        auth: Option<&'a Value>,
        connection: Option<Value>,
        emit: &'a EmitFn,
    ) -> BoxFuture<'a, Result<Option<Value>, TransportError>>;

    /// Sends the action over the given connection and returns the
    /// service's response.
    fn send<'a>(&'a self, action: &'a Action, connection: Option<&'a Value>)
        -> BoxFuture<'a, Response>;

    /// Returns `true` when this transporter supports listening for
    /// incoming requests.
    fn has_listen(&self) -> bool {
        false
    }

    /// Returns `true` when the given options configure this transporter
    /// to listen. Only consulted when [`Transporter::has_listen`] is
    /// `true`.
    fn should_listen(&self, _options: &TransporterOptions) -> bool {
        true
    }

    /// Starts listening for incoming requests, dispatching each one
    /// through the given function.
    fn listen<'a>(
        &'a self,
        _dispatch: DispatchFn,
        _connection: Option<&'a Value>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async {
            Response::error_with_status(
                "Transporter has no listen method",
                "transporter",
                iris_core::Status::Noaction,
            )
        })
    }

    /// Closes the given connection.
    fn disconnect<'a>(&'a self, connection: Option<Value>) -> BoxFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::Status;

    struct MinimalTransporter;

    impl Transporter for MinimalTransporter {
        fn connect<'a>(
            &'a self,
            _options: &'a TransporterOptions,
            _auth: Option<&'a Value>,
            _connection: Option<Value>,
            _emit: &'a EmitFn,
        ) -> BoxFuture<'a, Result<Option<Value>, TransportError>> {
            Box::pin(async { Ok(None) })
        }

        fn send<'a>(
            &'a self,
            _action: &'a Action,
            _connection: Option<&'a Value>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async { Response::ok(None) })
        }

        fn disconnect<'a>(&'a self, _connection: Option<Value>) -> BoxFuture<'a, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_defaults() {
        let transporter = MinimalTransporter;
        assert!(transporter.authentication().is_none());
        assert!(!transporter.has_listen());
        assert!(transporter.should_listen(&TransporterOptions::new()));

        let response = transporter
            .listen(Arc::new(|_| Box::pin(async { Response::ok(None) })), None)
            .await;
        assert_eq!(response.status, Some(Status::Noaction));
    }

    #[test]
    fn test_prepare_options_passthrough() {
        let mut options = TransporterOptions::new();
        options.insert("uri".to_string(), Value::String("http://api".to_string()));
        let prepared = MinimalTransporter.prepare_options(options.clone(), "entries");
        assert_eq!(prepared, options);
    }
}
