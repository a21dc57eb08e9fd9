//! The `SERVICE` handler.
//!
//! Sends an action straight to a named service, bypassing endpoint
//! mutation. The service is free to do whatever with it; a good way to
//! trigger clean-up routines implemented in the transporter.

use iris_core::{Action, BoxFuture, HandlerResult, Response, Status};

use crate::dispatch::{ActionHandler, HandlerResources};
use crate::handlers::unknown_service_error;

/// Sends an action straight to a service.
pub struct SendServiceHandler;

impl ActionHandler for SendServiceHandler {
    fn handle<'a>(
        &'a self,
        action: Action,
        resources: &'a HandlerResources,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let service_id = action.payload.target_service.as_deref();
            let Some(service) = resources.get_service(&[], service_id) else {
                return Ok(unknown_service_error(&[], service_id, "SERVICE"));
            };

            let mut action = action;
            action.meta.authorized = true;

            let response = service.send(action).await;
            if response.has_status() {
                Ok(response)
            } else {
                Ok(Response::error_with_status(
                    format!(
                        "Service '{}' did not respond correctly to SERVICE action",
                        service.id()
                    ),
                    "handler:SERVICE",
                    Status::Badresponse,
                ))
            }
        })
    }
}
