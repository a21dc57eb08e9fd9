//! The `SET` handler.
//!
//! Writes the payload data to a service. The request pipeline casts the
//! data to the schema shape and applies item-level authorization before
//! the endpoint mutation, so refused items never leave the instance.

use iris_core::{Action, BoxFuture, HandlerResult, Response, Status};

use crate::dispatch::{ActionHandler, HandlerResources};
use crate::handlers::unknown_service_error;

/// Sends data to a service, based on the given action.
pub struct SetHandler;

impl ActionHandler for SetHandler {
    fn handle<'a>(
        &'a self,
        action: Action,
        resources: &'a HandlerResources,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let types = action.payload.types();
            let service_id = action.payload.target_service.as_deref();
            let Some(service) = resources.get_service(&types, service_id) else {
                return Ok(unknown_service_error(&types, service_id, "SET"));
            };

            let Some(endpoint) = service.endpoint_from_action(&action, false) else {
                return Ok(Response::error_with_status(
                    format!(
                        "No endpoint matching SET request to service '{}'.",
                        service.id()
                    ),
                    "handler:SET",
                    Status::Badrequest,
                ));
            };

            tracing::debug!(service = %service.id(), "SET: sending data to service");

            let authorized = service.authorize_action(action);
            if authorized.status().is_some() {
                return Ok(service.mutate_response(authorized, endpoint).await);
            }

            let request_action = service.mutate_request(authorized.clone(), endpoint).await;
            let response = service.send(request_action).await;
            Ok(service
                .mutate_response(authorized.set_response(response), endpoint)
                .await)
        })
    }
}
