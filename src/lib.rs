//! SCIM 2.0 protocol adapter for Rust.
//!
//! Exposes identity data held in arbitrary backend systems as SCIM 2.0
//! resources. Requests are validated against RFC 7643 schemas, filters and
//! PATCH bodies are interpreted per RFC 7644, and records are translated to
//! and from backend shapes by data-driven mapping tables.
//!
//! # Core Components
//!
//! - [`SchemaRegistry`] - Schemas and resource types, with validation
//! - [`filter`] - Filter parsing and in-memory evaluation
//! - [`patch`] - PATCH operation parsing and application
//! - [`ResourceMapper`] - Mapping-table driven record translation
//! - [`Connector`] - Trait for backend systems
//! - [`Dispatcher`] - Routes SCIM requests to connectors
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scim_adapter::{AdapterConfig, DispatcherBuilder, InMemoryConnector, MappingTable, ScimRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = DispatcherBuilder::new()
//!     .with_config(AdapterConfig::from_file("adapter.json")?)
//!     .with_connector(Arc::new(InMemoryConnector::new("hr")))
//!     .build()?;
//! let response = dispatcher.dispatch(ScimRequest::get("/Users")).await;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod patch;
pub mod resource;
pub mod schema;

// Re-export commonly used types for convenience
pub use config::AdapterConfig;
pub use connector::{
    Connector, ConnectorCapabilities, ConnectorError, ConnectorRegistry, ConnectorResult,
    InMemoryConnector, ListPage, PageRequest,
};
pub use dispatcher::{
    AllowAll, AuthorizationContext, Authorizer, Dispatcher, DispatcherBuilder, ListResponse,
    Operation, ScimRequest, ScimResponse,
};
pub use error::{BuildError, BuildResult, ScimError, ScimResult, ScimType, ValidationError};
pub use filter::{AttributePath, FilterEvaluator, FilterNode, FilterParser, parse_filter};
pub use mapper::{MappingTable, ResourceMapper, Transform, TransformRegistry};
pub use patch::{NoTargetPolicy, PatchApplier, PatchOperation, PatchRequest};
pub use resource::{Meta, ResourceVersion, ScimResource};
pub use schema::{OperationContext, Schema, SchemaRegistry};
