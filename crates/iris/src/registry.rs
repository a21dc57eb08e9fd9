//! The service registry.
//!
//! Resolves a service by declared data type or explicit id. Built once
//! at boot from the schema and service definitions and read-only
//! afterwards; per-action dispatch never mutates it.

use iris_authz::Schemas;
use iris_core::Response;
use std::collections::HashMap;
use std::sync::Arc;

use iris_service::Service;

/// Resolves services by data type or explicit id.
pub struct ServiceRegistry {
    services: HashMap<String, Arc<Service>>,
    service_by_type: HashMap<String, String>,
}

impl ServiceRegistry {
    /// Builds a registry from the given services and schemas.
    ///
    /// The type-to-service mapping comes from each schema's declared
    /// `service`; schemas without one are only reachable through
    /// explicit service ids.
    #[must_use]
    pub fn new(services: Vec<Arc<Service>>, schemas: &Schemas) -> Self {
        let services: HashMap<String, Arc<Service>> = services
            .into_iter()
            .map(|service| (service.id().to_string(), service))
            .collect();

        let service_by_type = schemas
            .values()
            .filter_map(|schema| {
                schema
                    .service
                    .as_ref()
                    .map(|service| (schema.id.clone(), service.clone()))
            })
            .collect();

        Self {
            services,
            service_by_type,
        }
    }

    /// Returns the service with the given id.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<Arc<Service>> {
        self.services.get(id).cloned()
    }

    /// Resolves a service by explicit id or by requested data types.
    ///
    /// An explicit id always wins; otherwise the first requested type
    /// with a declared service resolves.
    #[must_use]
    pub fn resolve(&self, types: &[&str], service_id: Option<&str>) -> Option<Arc<Service>> {
        if let Some(id) = service_id {
            return self.by_id(id);
        }
        types
            .iter()
            .find_map(|r#type| self.service_by_type.get(*r#type))
            .and_then(|id| self.services.get(id))
            .cloned()
    }

    /// Returns all registered services.
    pub fn services(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.values()
    }

    /// Closes every registered service.
    ///
    /// Returns the first failing response, or `ok` when all closed.
    pub async fn close_all(&self) -> Response {
        for service in self.services.values() {
            let response = service.close().await;
            if !response.is_success() {
                return response;
            }
        }
        Response::ok(None)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}
