//! The dispatcher: the single entry point of an Iris instance.
//!
//! The dispatcher looks up a handler by action type and invokes it
//! inside the middleware onion composed at construction time. When the
//! action carries the queue flag and a queue service is configured,
//! dispatch is rerouted to the queue service instead of invoking the
//! handler directly.
//!
//! Every dispatch produces exactly one response, and that response
//! always carries a status: a handler resolving without one is a bug
//! and is surfaced as an `error` response.

use iris_core::{Action, BoxFuture, HandlerResult, Response, Status};
use iris_middleware::MiddlewareStack;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::queue;
use crate::registry::ServiceRegistry;
use iris_service::{DispatchFn, Service};

/// Identity configuration for the instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentConfig {
    /// The schema type holding identities.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Global options handed to handlers.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Identity configuration, when one is set.
    pub ident_config: Option<IdentConfig>,
    /// Id of the service used for queueing, when one is designated.
    pub queue_service: Option<String>,
}

/// Progress callback for long-running handlers, reporting a fraction
/// between 0 and 1.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Resources handed to every handler invocation.
pub struct HandlerResources {
    /// Dispatch function for follow-up actions.
    pub dispatch: DispatchFn,
    /// The service registry.
    pub registry: Arc<ServiceRegistry>,
    /// Progress reporting callback.
    pub set_progress: ProgressFn,
    /// Global handler options.
    pub options: HandlerOptions,
}

impl HandlerResources {
    /// Resolves a service by requested types or explicit id.
    #[must_use]
    pub fn get_service(&self, types: &[&str], service_id: Option<&str>) -> Option<Arc<Service>> {
        self.registry.resolve(types, service_id)
    }
}

/// An action handler, one per action type.
///
/// A returned error is caught by the dispatcher and converted into a
/// response with status `error`, tagged with the handler's origin.
pub trait ActionHandler: Send + Sync + 'static {
    /// Handles the action.
    fn handle<'a>(
        &'a self,
        action: Action,
        resources: &'a HandlerResources,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// The single entry point: composes middleware around the typed
/// handler registry.
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    registry: Arc<ServiceRegistry>,
    middleware: MiddlewareStack,
    options: HandlerOptions,
}

impl Dispatcher {
    /// Creates a dispatcher from its parts.
    #[must_use]
    pub fn new(
        handlers: HashMap<String, Arc<dyn ActionHandler>>,
        registry: Arc<ServiceRegistry>,
        middleware: MiddlewareStack,
        options: HandlerOptions,
    ) -> Self {
        Self {
            handlers,
            registry,
            middleware,
            options,
        }
    }

    /// Returns the service registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Dispatches an action and returns its response.
    ///
    /// Exactly one response is produced per call, and it always
    /// carries a status.
    pub async fn dispatch(self: &Arc<Self>, action: Action) -> Response {
        if action.action_type.is_empty() {
            return Response::error("Dispatched no action", "dispatch");
        }

        let response = self
            .middleware
            .process(action, |action| {
                Box::pin(async move { self.run(action).await })
            })
            .await;

        ensure_status(response).set_origin("dispatch")
    }

    /// Returns a `'static` dispatch function backed by this dispatcher.
    ///
    /// Handed to handlers and listening transporters for follow-up
    /// dispatches.
    #[must_use]
    pub fn dispatch_fn(self: &Arc<Self>) -> DispatchFn {
        let dispatcher = self.clone();
        Arc::new(move |action: Action| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move { dispatcher.dispatch(action).await })
        })
    }

    /// The innermost dispatch step: queue rerouting or handler lookup.
    async fn run(self: &Arc<Self>, action: Action) -> Response {
        if action.meta.queue {
            if let Some(queue_service) = self
                .options
                .queue_service
                .as_deref()
                .and_then(|id| self.registry.by_id(id))
            {
                tracing::debug!(
                    action = %action.action_type,
                    queue = %queue_service.id(),
                    "Rerouting action to queue service"
                );
                return queue::send_to_queue(&queue_service, action).await;
            }
            // No queue service configured: the flag has no effect
        }

        let Some(handler) = self.handlers.get(&action.action_type) else {
            return Response::error_with_status(
                format!("No handler for {} action", action.action_type),
                "dispatch",
                Status::Badrequest,
            );
        };

        let origin = format!("handler:{}", action.action_type);
        let resources = HandlerResources {
            dispatch: self.dispatch_fn(),
            registry: self.registry.clone(),
            set_progress: Arc::new(|_progress| {}),
            options: self.options.clone(),
        };

        match handler.handle(action, &resources).await {
            Ok(response) => response.set_origin(origin),
            Err(error) => Response::error(error.to_string(), origin),
        }
    }
}

fn ensure_status(mut response: Response) -> Response {
    if response.status.is_none() {
        response.status = Some(Status::Error);
        response.error = Some(
            response
                .error
                .unwrap_or_else(|| "Dispatched action did not return a status".to_string()),
        );
    }
    response
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
