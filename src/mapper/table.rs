//! Declarative mapping tables.
//!
//! ```json
//! {
//!   "resourceType": "User",
//!   "system": "hr",
//!   "entries": [
//!     { "scimPath": "id", "backendPath": "uid" },
//!     { "scimPath": "userName", "backendPath": "login", "transform": "lowercase" },
//!     { "scimPath": "emails[type eq \"work\"].value", "backendPath": "contact.work_email" }
//!   ],
//!   "catchAll": "backendAttributes"
//! }
//! ```

use crate::error::{BuildError, BuildResult};

use serde::{Deserialize, Serialize};

/// One SCIM attribute ↔ backend field correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    /// SCIM attribute path; may select one element with an equality value filter
    pub scim_path: String,
    /// Dot-separated backend field path
    pub backend_path: String,
    /// Transform name, when the value needs converting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

/// Mapping between one SCIM resource type and one backend system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTable {
    pub resource_type: String,
    pub system: String,
    #[serde(default)]
    pub entries: Vec<MappingEntry>,
    /// Top-level SCIM key collecting backend fields no entry maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_all: Option<String>,
}

impl MappingTable {
    pub fn new(resource_type: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            system: system.into(),
            entries: Vec::new(),
            catch_all: None,
        }
    }

    pub fn from_json_str(json: &str) -> BuildResult<Self> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidConfiguration {
            message: format!("Invalid mapping table: {}", e),
        })
    }

    /// Map `scim_path` to `backend_path` unchanged.
    pub fn map(mut self, scim_path: impl Into<String>, backend_path: impl Into<String>) -> Self {
        self.entries.push(MappingEntry {
            scim_path: scim_path.into(),
            backend_path: backend_path.into(),
            transform: None,
        });
        self
    }

    /// Map `scim_path` to `backend_path` through a named transform.
    pub fn map_with(
        mut self,
        scim_path: impl Into<String>,
        backend_path: impl Into<String>,
        transform: impl Into<String>,
    ) -> Self {
        self.entries.push(MappingEntry {
            scim_path: scim_path.into(),
            backend_path: backend_path.into(),
            transform: Some(transform.into()),
        });
        self
    }

    pub fn with_catch_all(mut self, scim_key: impl Into<String>) -> Self {
        self.catch_all = Some(scim_key.into());
        self
    }
}
