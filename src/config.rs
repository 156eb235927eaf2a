//! Adapter configuration.
//!
//! Configuration is plain data: it can be assembled with the builder
//! methods or loaded from JSON.
//!
//! ```json
//! {
//!   "baseUrl": "https://idp.example.com/scim/v2",
//!   "maxResults": 200,
//!   "requestTimeoutMs": 30000,
//!   "bindings": { "User": "hr", "Group": "hr" },
//!   "noTarget": { "Group": "ignore" },
//!   "mappingTables": [
//!     { "resourceType": "User", "system": "hr",
//!       "entries": [{ "scimPath": "userName", "backendPath": "login" }] }
//!   ]
//! }
//! ```

use crate::error::{BuildError, BuildResult};
use crate::mapper::MappingTable;
use crate::patch::NoTargetPolicy;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default page size cap for list and search responses.
pub const DEFAULT_MAX_RESULTS: usize = 200;

/// Default upper bound on one connector call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    /// Base URL of the SCIM endpoints, used for `meta.location`
    pub base_url: String,
    /// Largest page the adapter returns, whatever `count` asks for
    pub max_results: usize,
    /// Connector call timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Resource type name → connector system name
    pub bindings: HashMap<String, String>,
    /// Per resource type PATCH behaviour for paths that select nothing
    pub no_target: HashMap<String, NoTargetPolicy>,
    pub mapping_tables: Vec<MappingTable>,
    /// Advertised in ServiceProviderConfig
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost/scim/v2".to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            bindings: HashMap::new(),
            no_target: HashMap::new(),
            mapping_tables: Vec::new(),
            documentation_uri: None,
        }
    }
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> BuildResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| BuildError::InvalidConfiguration {
            message: format!("Invalid adapter configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> BuildResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Serve `resource_type` from the connector registered as `system`.
    pub fn bind(mut self, resource_type: impl Into<String>, system: impl Into<String>) -> Self {
        self.bindings.insert(resource_type.into(), system.into());
        self
    }

    pub fn with_no_target_policy(mut self, resource_type: impl Into<String>, policy: NoTargetPolicy) -> Self {
        self.no_target.insert(resource_type.into(), policy);
        self
    }

    pub fn with_mapping_table(mut self, table: MappingTable) -> Self {
        self.mapping_tables.push(table);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resource type names compare case-insensitively.
    pub fn no_target_policy(&self, resource_type: &str) -> NoTargetPolicy {
        self.no_target
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(resource_type))
            .map(|(_, policy)| *policy)
            .unwrap_or_default()
    }

    pub fn binding(&self, resource_type: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(resource_type))
            .map(|(_, system)| system.as_str())
    }

    /// `meta.location` of a resource.
    pub fn location(&self, endpoint: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_matches('/'),
            id
        )
    }

    pub fn validate(&self) -> BuildResult<()> {
        let invalid = |message: &str| {
            Err(BuildError::InvalidConfiguration {
                message: message.to_string(),
            })
        };
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return invalid("baseUrl must be an http(s) URL");
        }
        if self.max_results == 0 {
            return invalid("maxResults must be positive");
        }
        if self.request_timeout_ms == 0 {
            return invalid("requestTimeoutMs must be positive");
        }
        Ok(())
    }
}
