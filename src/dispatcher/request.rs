//! Incoming requests and route resolution.

use crate::error::{ScimError, ScimResult, ValidationError};
use crate::schema::SchemaRegistry;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods the adapter serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// A request as handed over by the HTTP layer: the path relative to the
/// SCIM base URL and already-decoded query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScimRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ScimRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: HashMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new("POST", path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new("PUT", path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new("PATCH", path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Query parameter by case-insensitive name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Integer query parameter.
    pub fn integer_param(&self, name: &str) -> ScimResult<Option<i64>> {
        self.query_param(name)
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|_| {
                    ScimError::from(ValidationError::invalid_type(name, "integer", raw))
                })
            })
            .transpose()
    }

    /// Comma-separated list parameter (`attributes`, `excludedAttributes`).
    pub fn list_param(&self, name: &str) -> Vec<String> {
        self.query_param(name)
            .map(split_list)
            .unwrap_or_default()
    }

    pub(crate) fn body(&self) -> ScimResult<&Value> {
        self.body
            .as_ref()
            .ok_or_else(|| ScimError::invalid_syntax("Request body is required"))
    }
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a request path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/{endpoint}`
    Collection {
        system: Option<String>,
        resource_type: String,
    },
    /// `/{endpoint}/{id}`
    Resource {
        system: Option<String>,
        resource_type: String,
        id: String,
    },
    /// `/{endpoint}/.search`
    Search {
        system: Option<String>,
        resource_type: String,
    },
    Schemas,
    Schema(String),
    ResourceTypes,
    ResourceType(String),
    ServiceProviderConfig,
}

const SCHEMAS: &str = "Schemas";
const RESOURCE_TYPES: &str = "ResourceTypes";
const SERVICE_PROVIDER_CONFIG: &str = "ServiceProviderConfig";
const SEARCH: &str = ".search";

fn is_discovery(segment: &str) -> bool {
    [SCHEMAS, RESOURCE_TYPES, SERVICE_PROVIDER_CONFIG]
        .iter()
        .any(|name| name.eq_ignore_ascii_case(segment))
}

impl Route {
    /// Resolve a path against the registered resource type endpoints.
    ///
    /// A leading segment that is not an endpoint is taken as a system
    /// name: `/hr/Users/42` addresses `Users/42` on system `hr`.
    pub fn parse(path: &str, registry: &SchemaRegistry) -> ScimResult<Self> {
        let not_found = || ScimError::EndpointNotFound {
            path: path.to_string(),
        };
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(not_found());
        }

        let is_endpoint = |segment: &str| is_discovery(segment) || registry.resource_type(segment).is_ok();
        let (system, rest) = match segments.split_first() {
            Some((first, rest)) if !is_endpoint(first) && !rest.is_empty() => {
                (Some((*first).to_string()), rest)
            }
            _ => (None, segments.as_slice()),
        };

        let Some((endpoint, tail)) = rest.split_first() else {
            return Err(not_found());
        };

        if is_discovery(endpoint) {
            return match (endpoint.to_ascii_lowercase().as_str(), tail) {
                ("schemas", []) => Ok(Route::Schemas),
                ("schemas", [id]) => Ok(Route::Schema((*id).to_string())),
                ("resourcetypes", []) => Ok(Route::ResourceTypes),
                ("resourcetypes", [name]) => Ok(Route::ResourceType((*name).to_string())),
                ("serviceproviderconfig", []) => Ok(Route::ServiceProviderConfig),
                _ => Err(not_found()),
            };
        }

        let resource_type = registry
            .resource_type(endpoint)
            .map_err(|_| not_found())?
            .name
            .clone();
        match tail {
            [] => Ok(Route::Collection {
                system,
                resource_type,
            }),
            [search] if *search == SEARCH => Ok(Route::Search {
                system,
                resource_type,
            }),
            [id] => Ok(Route::Resource {
                system,
                resource_type,
                id: (*id).to_string(),
            }),
            _ => Err(not_found()),
        }
    }
}
