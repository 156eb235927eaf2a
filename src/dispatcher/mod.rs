//! Request dispatch.
//!
//! The [`Dispatcher`] is the adapter's single entry point. Each request
//! goes through the same steps: route the path, authorize, resolve the
//! connector and mapping table, translate the filter or PATCH body, call
//! the connector under a timeout, map the result back and serialize it.
//! Every outcome is a [`ScimResponse`], success or SCIM error body.
//!
//! # Examples
//!
//! ```rust
//! use scim_adapter::config::AdapterConfig;
//! use scim_adapter::connector::InMemoryConnector;
//! use scim_adapter::dispatcher::{DispatcherBuilder, ScimRequest};
//! use scim_adapter::mapper::MappingTable;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MappingTable::new("User", "hr")
//!     .map("id", "employee_id")
//!     .map("userName", "login");
//! let dispatcher = DispatcherBuilder::new()
//!     .with_config(AdapterConfig::new().bind("User", "hr"))
//!     .with_connector(Arc::new(InMemoryConnector::new("hr").with_id_field("employee_id")))
//!     .with_mapping_table(table)
//!     .build()?;
//!
//! let response = dispatcher
//!     .dispatch(ScimRequest::post("/Users", json!({ "userName": "bjensen" })))
//!     .await;
//! assert_eq!(response.status, 201);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod handlers;
pub mod pagination;
pub mod projection;
pub mod request;
pub mod response;

pub use builder::DispatcherBuilder;
pub use pagination::{PageSummary, Pagination};
pub use projection::Projection;
pub use request::{Method, Route, ScimRequest};
pub use response::{LIST_RESPONSE_SCHEMA, ListResponse, ScimResponse};

use crate::config::AdapterConfig;
use crate::connector::{Connector, ConnectorRegistry, ConnectorResult};
use crate::error::{ScimError, ScimResult};
use crate::mapper::ResourceMapper;
use crate::resource::ScimResource;
use crate::schema::SchemaRegistry;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a request asks the adapter to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Search,
    Get,
    Create,
    Replace,
    Patch,
    Delete,
    Discovery,
}

impl Operation {
    fn for_route(route: &Route, method: Method) -> Option<Self> {
        match (route, method) {
            (Route::Collection { .. }, Method::Get) => Some(Operation::List),
            (Route::Collection { .. }, Method::Post) => Some(Operation::Create),
            (Route::Search { .. }, Method::Post) => Some(Operation::Search),
            (Route::Resource { .. }, Method::Get) => Some(Operation::Get),
            (Route::Resource { .. }, Method::Put) => Some(Operation::Replace),
            (Route::Resource { .. }, Method::Patch) => Some(Operation::Patch),
            (Route::Resource { .. }, Method::Delete) => Some(Operation::Delete),
            (
                Route::Schemas
                | Route::Schema(_)
                | Route::ResourceTypes
                | Route::ResourceType(_)
                | Route::ServiceProviderConfig,
                Method::Get,
            ) => Some(Operation::Discovery),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Search => "search",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
            Operation::Discovery => "discovery",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the authorizer gets to see about a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationContext<'a> {
    pub request_id: &'a str,
    pub request: &'a ScimRequest,
    pub operation: Operation,
    pub resource_type: Option<&'a str>,
    /// System named by a path prefix, if any
    pub system: Option<&'a str>,
}

/// Access decision hook. Authentication itself belongs to the HTTP layer.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Err(reason)` rejects the request with 403.
    async fn authorize(&self, context: &AuthorizationContext<'_>) -> Result<(), String>;
}

/// Default authorizer: everything is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _context: &AuthorizationContext<'_>) -> Result<(), String> {
        Ok(())
    }
}

/// Per-request state for resource endpoints.
pub(crate) struct RequestContext {
    pub request_id: String,
    pub resource_type: String,
    pub endpoint: String,
    pub system: String,
    pub connector: Arc<dyn Connector>,
    pub mapper: Arc<ResourceMapper>,
}

pub(crate) struct DispatcherState {
    pub config: AdapterConfig,
    pub registry: SchemaRegistry,
    pub connectors: ConnectorRegistry,
    /// Keyed by (resource type name, system)
    pub mappers: HashMap<(String, String), Arc<ResourceMapper>>,
    pub authorizer: Arc<dyn Authorizer>,
}

/// Routes SCIM requests to connectors. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<DispatcherState>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.state.config.base_url)
            .field("connectors", &self.state.connectors)
            .field("mappings", &self.state.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dispatcher {
    pub(crate) fn from_state(state: DispatcherState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.state.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.state.registry
    }

    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.state.connectors
    }

    /// Handle one request. Never fails: errors become SCIM error responses.
    pub async fn dispatch(&self, request: ScimRequest) -> ScimResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        info!(
            "SCIM {} {} (request: '{}')",
            request.method, request.path, request_id
        );

        match self.handle(&request, &request_id).await {
            Ok(response) => {
                debug!(
                    "SCIM {} {} completed with status {} (request: '{}')",
                    request.method, request.path, response.status, request_id
                );
                response
            }
            Err(e) => {
                if e.is_internal_defect() {
                    error!(
                        "SCIM {} {} failed on an adapter defect: {} (request: '{}')",
                        request.method, request.path, e, request_id
                    );
                } else if e.status() >= 500 {
                    warn!(
                        "SCIM {} {} failed: {} (request: '{}')",
                        request.method, request.path, e, request_id
                    );
                } else {
                    info!(
                        "SCIM {} {} rejected with {}: {} (request: '{}')",
                        request.method,
                        request.path,
                        e.status(),
                        e,
                        request_id
                    );
                }
                ScimResponse::error(&e)
            }
        }
    }

    async fn handle(&self, request: &ScimRequest, request_id: &str) -> ScimResult<ScimResponse> {
        let route = Route::parse(&request.path, &self.state.registry)?;
        let not_allowed = || ScimError::MethodNotAllowed {
            method: request.method.clone(),
            path: request.path.clone(),
        };
        let method: Method = request.method.parse().map_err(|_| not_allowed())?;
        let operation = Operation::for_route(&route, method).ok_or_else(not_allowed)?;

        let (resource_type, system) = match &route {
            Route::Collection {
                system,
                resource_type,
            }
            | Route::Resource {
                system,
                resource_type,
                ..
            }
            | Route::Search {
                system,
                resource_type,
            } => (Some(resource_type.as_str()), system.as_deref()),
            _ => (None, None),
        };

        let authorization = AuthorizationContext {
            request_id,
            request,
            operation,
            resource_type,
            system,
        };
        self.state
            .authorizer
            .authorize(&authorization)
            .await
            .map_err(|message| ScimError::Forbidden { message })?;

        use handlers::{crud, discovery, query};
        match route {
            Route::Schemas => discovery::handle_schemas(self),
            Route::Schema(id) => discovery::handle_schema(self, &id),
            Route::ResourceTypes => discovery::handle_resource_types(self),
            Route::ResourceType(name) => discovery::handle_resource_type(self, &name),
            Route::ServiceProviderConfig => discovery::handle_service_provider_config(self),
            Route::Collection {
                system,
                resource_type,
            }
            | Route::Search {
                system,
                resource_type,
            } => {
                let context = self.resolve(request_id, &resource_type, system.as_deref())?;
                match operation {
                    Operation::Create => crud::handle_create(self, request, &context).await,
                    Operation::Search => query::handle_search(self, request, &context).await,
                    _ => query::handle_list(self, request, &context).await,
                }
            }
            Route::Resource {
                system,
                resource_type,
                id,
            } => {
                let context = self.resolve(request_id, &resource_type, system.as_deref())?;
                match operation {
                    Operation::Replace => crud::handle_replace(self, request, &context, &id).await,
                    Operation::Patch => crud::handle_patch(self, request, &context, &id).await,
                    Operation::Delete => crud::handle_delete(self, &context, &id).await,
                    _ => crud::handle_get(self, request, &context, &id).await,
                }
            }
        }
    }

    /// Pick the connector and mapping for a resource type: the path prefix
    /// wins, then the configured binding, then the only mapped system.
    fn resolve(
        &self,
        request_id: &str,
        resource_type: &str,
        system: Option<&str>,
    ) -> ScimResult<RequestContext> {
        let endpoint = self
            .state
            .registry
            .resource_type(resource_type)?
            .endpoint_name()
            .to_string();
        let not_found = |system: &str| ScimError::EndpointNotFound {
            path: format!("/{}/{}", system, endpoint),
        };

        let system = match system.or_else(|| self.state.config.binding(resource_type)) {
            Some(system) => system.to_string(),
            None => {
                let mut systems = self
                    .state
                    .mappers
                    .keys()
                    .filter(|(rt, _)| rt == resource_type)
                    .map(|(_, system)| system);
                match (systems.next(), systems.next()) {
                    (Some(system), None) => system.clone(),
                    _ => {
                        return Err(ScimError::EndpointNotFound {
                            path: format!("/{}", endpoint),
                        });
                    }
                }
            }
        };

        let connector = self
            .state
            .connectors
            .get(&system)
            .ok_or_else(|| not_found(&system))?;
        let mapper = self
            .state
            .mappers
            .get(&(resource_type.to_string(), system.clone()))
            .cloned()
            .ok_or_else(|| not_found(&system))?;

        debug!(
            "Resolved {} to system '{}' (request: '{}')",
            resource_type, system, request_id
        );
        Ok(RequestContext {
            request_id: request_id.to_string(),
            resource_type: resource_type.to_string(),
            endpoint,
            system,
            connector,
            mapper,
        })
    }

    /// Run one connector call on its own task, bounded by the configured
    /// timeout. An expired call is aborted.
    pub(crate) async fn invoke<T, F, Fut>(
        &self,
        context: &RequestContext,
        operation: &'static str,
        call: F,
    ) -> ScimResult<T>
    where
        F: FnOnce(Arc<dyn Connector>) -> Fut,
        Fut: Future<Output = ConnectorResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.state.config.request_timeout();
        let mut task = tokio::spawn(call(context.connector.clone()));

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result.map_err(|e| {
                debug!(
                    "Connector '{}' {} failed: {} (request: '{}')",
                    context.system, operation, e, context.request_id
                );
                e.into_scim_error(&context.system, &context.resource_type)
            }),
            Ok(Err(join_error)) => Err(ScimError::internal(format!(
                "Connector '{}' {} task failed: {}",
                context.system, operation, join_error
            ))),
            Err(_) => {
                task.abort();
                warn!(
                    "Connector '{}' {} exceeded {:?}, aborted (request: '{}')",
                    context.system, operation, timeout, context.request_id
                );
                Err(ScimError::Timeout {
                    system: context.system.clone(),
                    operation: operation.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Map a backend record to SCIM and fill in `meta`.
    pub(crate) fn render(&self, context: &RequestContext, record: &Value) -> ScimResult<ScimResource> {
        let mut resource = context.mapper.to_scim(record)?;
        resource.meta.resource_type = context.resource_type.clone();
        if let Some(id) = resource.id.clone() {
            resource.meta.location = Some(self.state.config.location(&context.endpoint, &id));
        }
        resource.ensure_version();
        Ok(resource)
    }

    /// Project a rendered resource into a response.
    pub(crate) fn respond(
        &self,
        context: &RequestContext,
        resource: &ScimResource,
        status: u16,
        projection: &Projection,
    ) -> ScimResponse {
        let body = projection.apply(&self.state.registry, &context.resource_type, resource.to_json());
        ScimResponse::new(status, Some(body)).with_resource_headers()
    }
}
