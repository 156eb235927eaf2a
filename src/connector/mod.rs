//! Backend connector interface.
//!
//! A connector speaks to one backend identity system in that system's own
//! record format. The dispatcher never hands it SCIM JSON: records pass
//! through the [`ResourceMapper`](crate::mapper::ResourceMapper) first.
//!
//! Connectors are registered by name in a [`ConnectorRegistry`] while the
//! dispatcher is built and shared as `Arc<dyn Connector>` afterwards.

pub mod in_memory;
pub mod registry;

pub use in_memory::InMemoryConnector;
pub use registry::ConnectorRegistry;

use crate::error::ScimError;
use crate::filter::FilterNode;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// What a backend can do natively. Anything it cannot do, the dispatcher
/// does in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorCapabilities {
    /// `list` honours the filter it is given
    pub filtering: bool,
    /// `list` honours the page it is given
    pub pagination: bool,
}

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub start_index: usize,
    pub count: usize,
}

impl PageRequest {
    /// Zero-based offset of the first record.
    pub fn offset(&self) -> usize {
        self.start_index.saturating_sub(1)
    }
}

/// Result of [`Connector::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub records: Vec<Value>,
    /// Total matching records, when the backend knows it
    pub total_results: Option<usize>,
    /// Whether `records` is already the requested page
    pub paged: bool,
}

impl ListPage {
    /// Every record, unpaged.
    pub fn complete(records: Vec<Value>) -> Self {
        Self {
            total_results: Some(records.len()),
            records,
            paged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    #[error("Record '{id}' not found")]
    NotFound { id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("Operation '{operation}' is not supported")]
    Unsupported { operation: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl ConnectorError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Translate into the SCIM error reported to the client.
    pub fn into_scim_error(self, system: &str, resource_type: &str) -> ScimError {
        match self {
            ConnectorError::NotFound { id } => ScimError::resource_not_found(resource_type, id),
            ConnectorError::Conflict { message } => ScimError::Uniqueness { message },
            ConnectorError::Unavailable { message } => ScimError::BackendUnavailable {
                system: system.to_string(),
                message,
            },
            ConnectorError::Unsupported { operation } => ScimError::NotImplemented {
                system: system.to_string(),
                operation,
            },
            ConnectorError::Backend { message } => {
                ScimError::internal(format!("Backend '{}' failed: {}", system, message))
            }
        }
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Access to one backend identity system.
///
/// `resource_type` is the SCIM resource type name ("User", "Group") so one
/// connector can serve several types. Filters handed to [`Connector::list`]
/// are already rewritten over backend field paths.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name the connector is registered under.
    fn name(&self) -> &str;

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities::default()
    }

    async fn list(
        &self,
        resource_type: &str,
        filter: Option<&FilterNode>,
        page: PageRequest,
    ) -> ConnectorResult<ListPage>;

    async fn get(&self, resource_type: &str, id: &str) -> ConnectorResult<Value>;

    async fn create(&self, resource_type: &str, record: Value) -> ConnectorResult<Value>;

    async fn replace(&self, resource_type: &str, id: &str, record: Value) -> ConnectorResult<Value>;

    async fn delete(&self, resource_type: &str, id: &str) -> ConnectorResult<()>;
}
