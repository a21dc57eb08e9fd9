//! Bootstrap: building an Iris instance from definitions and resources.
//!
//! Definitions are data (loadable from JSON/TOML); resources are code:
//! transporters, authenticators, mutators and handlers. `create()`
//! builds schemas, auths, services, the registry and the dispatcher,
//! validating every cross-reference up front.

use iris_authz::Schemas;
use iris_core::{Action, Mutator, Response, Schema, SchemaDef, Status};
use iris_middleware::{Middleware, MiddlewareStack};
use iris_service::{
    noop_emit, Auth, AuthOptions, Authenticator, DispatchFn, Service, ServiceDef, ServiceError,
    ServiceResources, Transporter,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::dispatch::{ActionHandler, Dispatcher, HandlerOptions, IdentConfig};
use crate::handlers::builtin_handlers;
use crate::registry::ServiceRegistry;

/// Definition of an auth, loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthDef {
    /// The auth id, referenced from service definitions.
    pub id: String,
    /// Id of the authenticator implementing this auth.
    pub authenticator: String,
    /// Options handed to the authenticator.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: AuthOptions,
}

/// The complete setup of an instance, as data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Definitions {
    /// Schema definitions.
    pub schemas: Vec<SchemaDef>,
    /// Service definitions.
    pub services: Vec<ServiceDef>,
    /// Auth definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auths: Vec<AuthDef>,
    /// Identity configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident_config: Option<IdentConfig>,
    /// Id of the service used for queueing actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_service: Option<String>,
}

/// The pluggable code an instance is built with.
#[derive(Default)]
pub struct Resources {
    /// Transporters by id.
    pub transporters: HashMap<String, Arc<dyn Transporter>>,
    /// Extra or overriding handlers by action type.
    pub handlers: HashMap<String, Arc<dyn ActionHandler>>,
    /// Authenticators by id.
    pub authenticators: HashMap<String, Arc<dyn Authenticator>>,
    /// Mutators by name.
    pub mutators: HashMap<String, Arc<dyn Mutator>>,
}

/// Validation error raised when building an instance.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// A service definition is invalid.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// An auth references an authenticator that is not provided.
    #[error("Auth '{auth}' references unknown authenticator '{authenticator}'")]
    UnknownAuthenticator {
        /// The auth id.
        auth: String,
        /// The missing authenticator id.
        authenticator: String,
    },
}

/// A running Iris instance.
///
/// Owns the dispatcher and the service registry. Dispatch is the single
/// entry point; `listen()` starts every listening-capable service and
/// `close()` releases all connections.
pub struct Instance {
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ServiceRegistry>,
    schemas: Arc<Schemas>,
}

impl Instance {
    /// Dispatches an action and returns its response.
    pub async fn dispatch(&self, action: Action) -> Response {
        self.dispatcher.dispatch(action).await
    }

    /// Returns a `'static` dispatch function for this instance.
    #[must_use]
    pub fn dispatch_fn(&self) -> DispatchFn {
        self.dispatcher.dispatch_fn()
    }

    /// Returns the service registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Returns the schema index.
    #[must_use]
    pub fn schemas(&self) -> &Arc<Schemas> {
        &self.schemas
    }

    /// Starts listening on every service whose transporter supports it.
    ///
    /// Services without listening support respond `noaction` and are
    /// skipped; the first real failure stops the setup and is returned.
    pub async fn listen(&self) -> Response {
        for service in self.registry.services() {
            let response = service.listen(self.dispatch_fn()).await;
            match response.status {
                Some(Status::Noaction) => {}
                Some(status) if status.is_error() => return response,
                _ => {}
            }
        }
        Response::ok(None)
    }

    /// Closes every service, releasing their connections.
    pub async fn close(&self) -> Response {
        self.registry.close_all().await
    }
}

fn build_auths(
    defs: Vec<AuthDef>,
    authenticators: &HashMap<String, Arc<dyn Authenticator>>,
) -> Result<HashMap<String, Arc<Auth>>, DefinitionError> {
    let mut auths = HashMap::with_capacity(defs.len());
    for def in defs {
        let authenticator = authenticators.get(&def.authenticator).cloned().ok_or_else(|| {
            DefinitionError::UnknownAuthenticator {
                auth: def.id.clone(),
                authenticator: def.authenticator.clone(),
            }
        })?;
        auths.insert(
            def.id.clone(),
            Arc::new(Auth::new(def.id, authenticator, def.options)),
        );
    }
    Ok(auths)
}

/// Creates an Iris instance.
///
/// Builds schemas, auths, services, the registry and the dispatcher
/// from the given definitions, resources and middleware. Middleware
/// wrap both the dispatcher and every service's transporter send, in
/// declaration order (first is outermost).
pub fn create(
    definitions: Definitions,
    resources: Resources,
    middleware: Vec<Arc<dyn Middleware>>,
) -> Result<Instance, DefinitionError> {
    let schemas: Arc<Schemas> = Arc::new(
        definitions
            .schemas
            .into_iter()
            .map(|def| (def.id.clone(), Schema::from_def(def)))
            .collect(),
    );

    let auths = build_auths(definitions.auths, &resources.authenticators)?;
    let stack = MiddlewareStack::new(middleware);

    let service_resources = ServiceResources {
        transporters: resources.transporters,
        auths,
        schemas: schemas.clone(),
        mutators: resources.mutators,
        middleware: stack.clone(),
        emit: noop_emit(),
    };

    let mut services = Vec::with_capacity(definitions.services.len());
    for def in definitions.services {
        services.push(Arc::new(Service::new(def, &service_resources)?));
    }

    let registry = Arc::new(ServiceRegistry::new(services, &schemas));

    let mut handlers = builtin_handlers();
    handlers.extend(resources.handlers);

    let dispatcher = Arc::new(Dispatcher::new(
        handlers,
        registry.clone(),
        stack,
        HandlerOptions {
            ident_config: definitions.ident_config,
            queue_service: definitions.queue_service,
        },
    ));

    tracing::debug!(
        services = registry.services().count(),
        schemas = schemas.len(),
        "Created Iris instance"
    );

    Ok(Instance {
        dispatcher,
        registry,
        schemas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_creates_instance_from_definitions() {
        let definitions: Definitions = serde_json::from_value(json!({
            "schemas": [{ "id": "entry", "service": "entries", "access": "all" }],
            "services": [{ "id": "entries" }]
        }))
        .unwrap();

        let instance = create(definitions, Resources::default(), vec![]).unwrap();
        assert!(instance.registry().by_id("entries").is_some());
        assert!(instance.schemas().contains_key("entry"));
    }

    #[test]
    fn test_unknown_authenticator_fails_validation() {
        let definitions: Definitions = serde_json::from_value(json!({
            "schemas": [],
            "services": [],
            "auths": [{ "id": "backend", "authenticator": "token" }]
        }))
        .unwrap();

        let result = create(definitions, Resources::default(), vec![]);
        assert!(matches!(
            result,
            Err(DefinitionError::UnknownAuthenticator { .. })
        ));
    }

    #[test]
    fn test_unknown_transporter_fails_validation() {
        let definitions: Definitions = serde_json::from_value(json!({
            "schemas": [],
            "services": [{ "id": "entries", "transporter": "http" }]
        }))
        .unwrap();

        let result = create(definitions, Resources::default(), vec![]);
        assert!(matches!(result, Err(DefinitionError::Service(_))));
    }

    #[tokio::test]
    async fn test_instance_dispatches() {
        let definitions: Definitions = serde_json::from_value(json!({
            "schemas": [],
            "services": []
        }))
        .unwrap();
        let instance = create(definitions, Resources::default(), vec![]).unwrap();

        let response = instance.dispatch(Action::new("UNKNOWN")).await;
        assert_eq!(response.status, Some(Status::Badrequest));
    }
}
