//! The service: one external system bound at runtime.
//!
//! A service owns one transporter, one connection, optional outgoing
//! and incoming auths, and an ordered list of endpoints. All fields are
//! private; configuration errors surface at construction time, never at
//! call time.
//!
//! The mutation operations apply cast, item-level authorization and the
//! endpoint mutator in a direction-dependent order. Outgoing requests
//! run cast → authorize → mutate; incoming requests run the reverse,
//! because incoming data must be normalized into the internal shape
//! before authorization rules (which operate on the internal shape) can
//! apply. Responses mirror this asymmetry.

use iris_authz::{authorize_action, authorize_data_from_service, authorize_data_to_service, Schemas};
use iris_core::{Action, ComposedMutator, Mutator, Response, Status};
use iris_middleware::MiddlewareStack;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::Auth;
use crate::connection::Connection;
use crate::endpoint::{endpoint_from_action, sort_by_specificity, Endpoint, EndpointDef};
use crate::transporter::{DispatchFn, EmitFn, Transporter, TransporterOptions};

/// Reference to the auth(s) a service uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthRef {
    /// One auth id, used for outgoing requests.
    Id(String),
    /// Separate auths for outgoing and incoming traffic.
    Split {
        /// Auth id for outgoing requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        outgoing: Option<String>,
        /// Auth id for validating incoming requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        incoming: Option<String>,
    },
}

/// Definition of a service, loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDef {
    /// The service id.
    pub id: String,
    /// Id of the transporter this service talks through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transporter: Option<String>,
    /// Auth reference(s) for this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRef>,
    /// Id of the service holding metadata for this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    /// Transporter options common to all endpoints.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: TransporterOptions,
    /// Name of a mutator applied by every endpoint of this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<String>,
    /// Endpoint definitions, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointDef>,
}

/// Shared resources services are built from.
pub struct ServiceResources {
    /// Transporters by id.
    pub transporters: HashMap<String, Arc<dyn Transporter>>,
    /// Configured auths by id.
    pub auths: HashMap<String, Arc<Auth>>,
    /// Schemas by data type.
    pub schemas: Arc<Schemas>,
    /// Mutators by name.
    pub mutators: HashMap<String, Arc<dyn Mutator>>,
    /// Middleware applied around every transporter send.
    pub middleware: MiddlewareStack,
    /// Event emitter handed to transporters.
    pub emit: EmitFn,
}

impl Default for ServiceResources {
    fn default() -> Self {
        Self {
            transporters: HashMap::new(),
            auths: HashMap::new(),
            schemas: Arc::new(Schemas::new()),
            mutators: HashMap::new(),
            middleware: MiddlewareStack::empty(),
            emit: crate::transporter::noop_emit(),
        }
    }
}

/// Configuration error raised when building a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The definition has no id.
    #[error("Can't create service without an id")]
    MissingId,
    /// The definition references a transporter that is not provided.
    #[error("Service '{service}' references unknown transporter '{transporter}'")]
    UnknownTransporter {
        /// The service id.
        service: String,
        /// The missing transporter id.
        transporter: String,
    },
    /// The definition references an auth that is not provided.
    #[error("Service '{service}' references unknown auth '{auth}'")]
    UnknownAuth {
        /// The service id.
        service: String,
        /// The missing auth id.
        auth: String,
    },
    /// The definition references a mutator that is not provided.
    #[error("Service '{service}' references unknown mutation '{mutation}'")]
    UnknownMutation {
        /// The service id.
        service: String,
        /// The missing mutator name.
        mutation: String,
    },
}

/// The runtime binding of one external system.
pub struct Service {
    id: String,
    meta: Option<String>,
    schemas: Arc<Schemas>,
    options: TransporterOptions,
    endpoints: Vec<Endpoint>,
    transporter: Option<Arc<dyn Transporter>>,
    auth: Option<Arc<Auth>>,
    incoming_auth: Option<Arc<Auth>>,
    connection: Option<Connection>,
    middleware: MiddlewareStack,
    require_auth: bool,
}

fn merge_options(base: &TransporterOptions, extra: &TransporterOptions) -> TransporterOptions {
    let mut merged = base.clone();
    for (key, value) in extra {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn lookup_auth(
    auths: &HashMap<String, Arc<Auth>>,
    service: &str,
    id: &str,
) -> Result<Arc<Auth>, ServiceError> {
    auths.get(id).cloned().ok_or_else(|| ServiceError::UnknownAuth {
        service: service.to_string(),
        auth: id.to_string(),
    })
}

fn lookup_mutator(
    mutators: &HashMap<String, Arc<dyn Mutator>>,
    service: &str,
    name: &str,
) -> Result<Arc<dyn Mutator>, ServiceError> {
    mutators
        .get(name)
        .cloned()
        .ok_or_else(|| ServiceError::UnknownMutation {
            service: service.to_string(),
            mutation: name.to_string(),
        })
}

impl Service {
    /// Builds a service from its definition and the shared resources.
    ///
    /// All configuration errors are raised here; the returned service
    /// never fails on configuration at call time.
    pub fn new(def: ServiceDef, resources: &ServiceResources) -> Result<Self, ServiceError> {
        if def.id.is_empty() {
            return Err(ServiceError::MissingId);
        }
        let service_id = def.id;

        let transporter = match &def.transporter {
            Some(id) => Some(resources.transporters.get(id).cloned().ok_or_else(|| {
                ServiceError::UnknownTransporter {
                    service: service_id.clone(),
                    transporter: id.clone(),
                }
            })?),
            None => None,
        };

        let (auth, incoming_auth, require_auth) = match &def.auth {
            None => (None, None, false),
            Some(AuthRef::Id(id)) => (
                Some(lookup_auth(&resources.auths, &service_id, id)?),
                None,
                true,
            ),
            Some(AuthRef::Split { outgoing, incoming }) => (
                outgoing
                    .as_deref()
                    .map(|id| lookup_auth(&resources.auths, &service_id, id))
                    .transpose()?,
                incoming
                    .as_deref()
                    .map(|id| lookup_auth(&resources.auths, &service_id, id))
                    .transpose()?,
                true,
            ),
        };

        let service_mutator = def
            .mutation
            .as_deref()
            .map(|name| lookup_mutator(&resources.mutators, &service_id, name))
            .transpose()?;

        let service_options = match &transporter {
            Some(transporter) => transporter.prepare_options(def.options.clone(), &service_id),
            None => def.options.clone(),
        };

        let mut endpoints = Vec::with_capacity(def.endpoints.len());
        for endpoint_def in sort_by_specificity(def.endpoints) {
            let merged = merge_options(&service_options, &endpoint_def.options);
            let options = match &transporter {
                Some(transporter) => transporter.prepare_options(merged, &service_id),
                None => merged,
            };

            let endpoint_mutator = endpoint_def
                .mutation
                .as_deref()
                .map(|name| lookup_mutator(&resources.mutators, &service_id, name))
                .transpose()?;
            let mutator: Option<Arc<dyn Mutator>> =
                match (service_mutator.clone(), endpoint_mutator) {
                    (Some(service), Some(endpoint)) => {
                        Some(Arc::new(ComposedMutator::new(vec![service, endpoint])))
                    }
                    (Some(service), None) => Some(service),
                    (None, Some(endpoint)) => Some(endpoint),
                    (None, None) => None,
                };

            endpoints.push(Endpoint::new(endpoint_def, options, mutator));
        }

        let connection = transporter.as_ref().map(|transporter| {
            Connection::new(
                transporter.clone(),
                service_options.clone(),
                resources.emit.clone(),
            )
        });

        Ok(Self {
            id: service_id,
            meta: def.meta,
            schemas: resources.schemas.clone(),
            options: service_options,
            endpoints,
            transporter,
            auth,
            incoming_auth,
            connection,
            middleware: resources.middleware.clone(),
            require_auth,
        })
    }

    /// Returns the service id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the id of the service holding this service's metadata.
    #[must_use]
    pub fn meta_service(&self) -> Option<&str> {
        self.meta.as_deref()
    }

    /// Selects the best-matching endpoint for the action.
    ///
    /// Returns `None` when nothing matches — callers produce the
    /// `badrequest`/`noaction` response themselves.
    #[must_use]
    pub fn endpoint_from_action(&self, action: &Action, is_incoming: bool) -> Option<&Endpoint> {
        endpoint_from_action(&self.endpoints, action, is_incoming)
    }

    /// Runs action-level authorization.
    ///
    /// Tags the action as authorized or attaches a `noaccess` response
    /// with a reason code.
    #[must_use]
    pub fn authorize_action(&self, action: Action) -> Action {
        authorize_action(&self.schemas, self.require_auth, action)
    }

    fn cast_payload(&self, mut action: Action, endpoint: &Endpoint) -> Action {
        if endpoint.allow_raw_request {
            return action;
        }
        let Some(r#type) = action.payload.types().first().map(ToString::to_string) else {
            return action;
        };
        let Some(schema) = self.schemas.get(&r#type) else {
            return action;
        };
        if let Some(data) = action.payload.data.take() {
            action.payload.data = Some(schema.cast(data));
        }
        action
    }

    fn cast_response(&self, mut action: Action, endpoint: &Endpoint) -> Action {
        if endpoint.allow_raw_response {
            return action;
        }
        let Some(r#type) = action.payload.types().first().map(ToString::to_string) else {
            return action;
        };
        let Some(schema) = self.schemas.get(&r#type) else {
            return action;
        };
        if let Some(mut response) = action.response.take() {
            if let Some(data) = response.data.take() {
                response.data = Some(schema.cast(data));
            }
            action.response = Some(response);
        }
        action
    }

    /// Mutates an outgoing request.
    ///
    /// Order: cast payload → authorize data to-service → endpoint
    /// mutation (reverse mapping). A mutation failure becomes a
    /// response with origin `mutate:request`.
    pub async fn mutate_request(&self, action: Action, endpoint: &Endpoint) -> Action {
        let mut action = action;
        action.meta.options = Some(Value::Object(endpoint.options.clone()));

        let casted = self.cast_payload(action, endpoint);
        let authorized =
            authorize_data_to_service(&self.schemas, casted, endpoint.allow_raw_request);

        let input = authorized.clone();
        match endpoint.mutate_request(authorized, false).await {
            Ok(mutated) => mutated,
            Err(error) => input.set_error(
                format!("Error while mutating request: {error}"),
                "mutate:request",
            ),
        }
    }

    /// Mutates a request received from the service.
    ///
    /// Order reversed from [`Service::mutate_request`]: endpoint
    /// mutation (forward mapping) → cast → authorize data to-service.
    pub async fn mutate_incoming_request(&self, action: Action, endpoint: &Endpoint) -> Action {
        let input = action.clone();
        let mutated = match endpoint.mutate_request(action, true).await {
            Ok(mutated) => mutated,
            Err(error) => {
                return input.set_error(
                    format!("Error while mutating incoming request: {error}"),
                    "mutate:request:incoming",
                )
            }
        };

        let casted = self.cast_payload(mutated, endpoint);
        authorize_data_to_service(&self.schemas, casted, endpoint.allow_raw_request)
    }

    /// Mutates the response to an outgoing request.
    ///
    /// Order: endpoint mutation (forward mapping) → cast → authorize
    /// data from-service. A mutation failure becomes a response with
    /// origin `mutate:response`, keeping any fields already set.
    pub async fn mutate_response(&self, action: Action, endpoint: &Endpoint) -> Response {
        let base = action.response.clone().unwrap_or_default();
        let mutated = match endpoint.mutate_response(action, false).await {
            Ok(mutated) => mutated,
            Err(error) => {
                return Response {
                    status: Some(Status::Error),
                    error: Some(format!("Error while mutating response: {error}")),
                    origin: Some("mutate:response".to_string()),
                    ..base
                }
            }
        };

        let casted = self.cast_response(mutated, endpoint);
        let authorized =
            authorize_data_from_service(&self.schemas, casted, endpoint.allow_raw_response);
        authorized.response.unwrap_or_default()
    }

    /// Mutates the response to an incoming request.
    ///
    /// Order reversed from [`Service::mutate_response`]: cast →
    /// authorize data from-service → endpoint mutation (reverse
    /// mapping).
    pub async fn mutate_incoming_response(&self, action: Action, endpoint: &Endpoint) -> Response {
        let base = action.response.clone().unwrap_or_default();

        let casted = self.cast_response(action, endpoint);
        let authorized =
            authorize_data_from_service(&self.schemas, casted, endpoint.allow_raw_response);

        match endpoint.mutate_response(authorized, true).await {
            Ok(mutated) => mutated.response.unwrap_or_default(),
            Err(error) => Response {
                status: Some(Status::Error),
                error: Some(format!("Error while mutating response: {error}")),
                origin: Some("mutate:response:incoming".to_string()),
                ..base
            },
        }
    }

    /// Sends the action to the service through the transporter.
    ///
    /// A no-op passthrough when the action already carries a status.
    /// Requires the action to be authorized; authenticates when an
    /// outgoing auth is configured, then runs the service middleware
    /// around the transporter send over the open connection.
    pub async fn send(&self, action: Action) -> Response {
        if let Some(response) = &action.response {
            if response.has_status() {
                return response.clone();
            }
        }

        let Some((transporter, connection)) =
            self.transporter.as_ref().zip(self.connection.as_ref())
        else {
            return Response::error(
                format!("Service '{}' has no transporter", self.id),
                format!("service:{}", self.id),
            );
        };

        if !action.is_authorized() {
            return Response::error_with_status(
                "Not authorized",
                format!("internal:service:{}", self.id),
                Status::Autherror,
            );
        }

        let mut action = action;
        if let Some(auth) = &self.auth {
            auth.authenticate(Some(&action)).await;
            action = auth.apply_to_action(action, transporter.as_ref()).await;
            if let Some(response) = &action.response {
                if response.has_status() {
                    return response.clone().set_origin(format!("service:{}", self.id));
                }
            }
        }

        let service_id = self.id.clone();
        let response = self
            .middleware
            .process(action, move |action| {
                Box::pin(async move {
                    match connection.connect(action.meta.auth.as_ref()).await {
                        Ok(object) => transporter.send(&action, object.as_ref()).await,
                        Err(error) => Response::error(
                            format!(
                                "Could not connect to service '{service_id}': {error}"
                            ),
                            format!("service:{service_id}"),
                        ),
                    }
                })
            })
            .await;

        response.set_origin(format!("middleware:service:{}", self.id))
    }

    /// Starts listening on the transporter, when it supports it.
    ///
    /// Incoming requests are decorated with this service's id as
    /// `sourceService`, run through the service middleware, and handed
    /// to the given dispatch function.
    pub async fn listen(&self, dispatch: DispatchFn) -> Response {
        tracing::debug!(service = %self.id, "Setting up service listening");

        let Some((transporter, connection)) =
            self.transporter.as_ref().zip(self.connection.as_ref())
        else {
            return Response::error(
                format!("Service '{}' has no transporter", self.id),
                format!("service:{}", self.id),
            );
        };

        if !transporter.has_listen() {
            return Response::error_with_status(
                "Transporter has no listen method",
                format!("service:{}", self.id),
                Status::Noaction,
            );
        }
        if !transporter.should_listen(&self.options) {
            return Response::error_with_status(
                "Transporter is not configured to listen",
                format!("service:{}", self.id),
                Status::Noaction,
            );
        }

        if let Some(auth) = &self.auth {
            if !auth.authenticate(None).await {
                return auth
                    .response_from_auth()
                    .await
                    .set_origin(format!("service:{}", self.id));
            }
        }
        if let Some(incoming_auth) = &self.incoming_auth {
            if !incoming_auth.authenticate(None).await {
                return incoming_auth
                    .response_from_auth()
                    .await
                    .set_origin(format!("service:{}", self.id));
            }
        }

        let auth_object = match &self.auth {
            Some(auth) => auth.auth_object(transporter.as_ref()).await,
            None => None,
        };

        match connection.connect(auth_object.as_ref()).await {
            Ok(object) => {
                let wrapped = self.wrap_incoming_dispatch(dispatch);
                transporter.listen(wrapped, object.as_ref()).await
            }
            Err(error) => Response::error(
                format!(
                    "Could not listen to '{}' service. Failed to connect: {error}",
                    self.id
                ),
                format!("service:{}", self.id),
            ),
        }
    }

    /// Wraps a dispatch function for incoming requests: stamps this
    /// service as `sourceService` and runs the service middleware.
    fn wrap_incoming_dispatch(&self, dispatch: DispatchFn) -> DispatchFn {
        let service_id = self.id.clone();
        let middleware = self.middleware.clone();
        Arc::new(move |mut action: Action| {
            let service_id = service_id.clone();
            let middleware = middleware.clone();
            let dispatch = dispatch.clone();
            Box::pin(async move {
                action.payload.source_service = Some(service_id);
                middleware
                    .process(action, move |action| {
                        Box::pin(async move { (*dispatch)(action).await })
                    })
                    .await
            })
        })
    }

    /// Disconnects the transporter and releases the connection.
    ///
    /// Idempotent.
    pub async fn close(&self) -> Response {
        tracing::debug!(service = %self.id, "Closing service");
        if let Some(connection) = &self.connection {
            connection.disconnect().await;
        }
        Response::ok(None)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}
