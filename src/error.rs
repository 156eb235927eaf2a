//! Error types for SCIM adapter operations.
//!
//! Every failure the adapter can produce is a [`ScimError`]. Each variant maps
//! to exactly one HTTP status and, where RFC 7644 §3.12 defines one, a
//! `scimType` keyword, so the dispatcher can always turn a failure into a
//! well-formed SCIM error body.

use crate::schema::Mutability;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Schema URI carried by every SCIM error response.
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// Main error type for SCIM adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum ScimError {
    /// Filter expression could not be parsed or references unknown attributes
    #[error("Invalid filter at offset {offset}: {message}")]
    InvalidFilter { message: String, offset: usize },

    /// Request body or PATCH operation is structurally malformed
    #[error("Invalid syntax: {message}")]
    InvalidSyntax { message: String },

    /// Attribute path is malformed or does not resolve
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// Resource data doesn't conform to its schema
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No resource type registered under this name or endpoint
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// Attribute path does not exist in the schema
    #[error("Unknown attribute '{attribute}' in schema '{schema_id}'")]
    UnknownAttribute {
        attribute: String,
        schema_id: String,
    },

    /// Schema id not registered
    #[error("Schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },

    /// Schema id registered twice
    #[error("Duplicate schema: {schema_id}")]
    DuplicateSchema { schema_id: String },

    /// Write to a readOnly or immutable attribute
    #[error("Attribute '{attribute}' is {mutability} and cannot be modified")]
    Mutability {
        attribute: String,
        mutability: Mutability,
    },

    /// PATCH path selected nothing where a target is required
    #[error("No target: {message}")]
    NoTarget { message: String },

    /// Backend reported a uniqueness conflict
    #[error("Uniqueness violation: {message}")]
    Uniqueness { message: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID {id}")]
    ResourceNotFound { resource_type: String, id: String },

    /// Backend call exceeded the per-request timeout
    #[error("Backend '{system}' did not complete {operation} within {timeout:?}")]
    Timeout {
        system: String,
        operation: String,
        timeout: Duration,
    },

    /// Required SCIM attributes absent after mapping a backend record
    #[error("Incomplete mapping for {resource_type}: missing {missing:?}")]
    IncompleteMapping {
        resource_type: String,
        missing: Vec<String>,
    },

    /// Mapping table cannot translate a value
    #[error("Mapping error: {message}")]
    Mapping { message: String },

    /// Endpoint exists but not for this HTTP method
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// No such SCIM endpoint
    #[error("Endpoint not found: {path}")]
    EndpointNotFound { path: String },

    /// Request asks for more than the service allows
    #[error("Too many: {message}")]
    TooMany { message: String },

    /// Authorization collaborator rejected the request
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Connector does not implement the requested capability
    #[error("Operation '{operation}' is not implemented by system '{system}'")]
    NotImplemented { system: String, operation: String },

    /// Connector reported its backend is unreachable
    #[error("Backend '{system}' unavailable: {message}")]
    BackendUnavailable { system: String, message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

/// `scimType` keywords from RFC 7644 §3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimType {
    InvalidFilter,
    TooMany,
    Uniqueness,
    Mutability,
    InvalidValue,
    InvalidPath,
    InvalidSyntax,
    InvalidVers,
    Sensitive,
    NoTarget,
}

impl fmt::Display for ScimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScimType::InvalidFilter => "invalidFilter",
            ScimType::TooMany => "tooMany",
            ScimType::Uniqueness => "uniqueness",
            ScimType::Mutability => "mutability",
            ScimType::InvalidValue => "invalidValue",
            ScimType::InvalidPath => "invalidPath",
            ScimType::InvalidSyntax => "invalidSyntax",
            ScimType::InvalidVers => "invalidVers",
            ScimType::Sensitive => "sensitive",
            ScimType::NoTarget => "noTarget",
        };
        f.write_str(s)
    }
}

/// SCIM error body as returned to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    pub schemas: Vec<String>,
    /// HTTP status code rendered as a string, per RFC 7644
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimType>,
    pub detail: String,
}

impl From<&ScimError> for ScimErrorResponse {
    fn from(error: &ScimError) -> Self {
        Self {
            schemas: vec![ERROR_SCHEMA.to_string()],
            status: error.status().to_string(),
            scim_type: error.scim_type(),
            detail: error.to_string(),
        }
    }
}

/// Validation errors for schema compliance checking.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Resource body is not a JSON object
    #[error("Resource must be a JSON object")]
    NotAnObject,

    /// Required attribute is missing
    #[error("Required attribute '{attribute}' is missing")]
    MissingRequiredAttribute { attribute: String },

    /// Attribute value doesn't match expected type
    #[error("Attribute '{attribute}' has invalid type, expected {expected}, got {actual}")]
    InvalidDataType {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// Multi-valued attribute provided as single value
    #[error("Attribute '{attribute}' must be multi-valued (array)")]
    ExpectedMultiValue { attribute: String },

    /// Single-valued attribute provided as array
    #[error("Attribute '{attribute}' must be single-valued (not array)")]
    ExpectedSingleValue { attribute: String },

    /// Invalid value for attribute with canonical values
    #[error("Attribute '{attribute}' has invalid value '{value}', allowed values: {allowed:?}")]
    InvalidCanonicalValue {
        attribute: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Invalid datetime format
    #[error("Attribute '{attribute}' has invalid datetime format: {value}")]
    InvalidDateTimeFormat { attribute: String, value: String },

    /// Invalid binary data
    #[error("Attribute '{attribute}' has invalid binary data: {details}")]
    InvalidBinaryData { attribute: String, details: String },

    /// Invalid reference URI
    #[error("Attribute '{attribute}' has invalid reference: {uri}")]
    InvalidReferenceUri { attribute: String, uri: String },

    /// Unknown attribute in resource
    #[error("Unknown attribute '{attribute}' in schema '{schema_id}'")]
    UnknownAttribute {
        attribute: String,
        schema_id: String,
    },

    /// `schemas` lists a URI that does not belong to the resource type
    #[error("Unknown schema URI: {uri}")]
    UnknownSchemaUri { uri: String },

    /// General validation error with custom message
    #[error("Validation failed: {message}")]
    Custom { message: String },
}

/// Errors raised while assembling a dispatcher at startup.
///
/// These are configuration mistakes and should surface before the adapter
/// starts serving requests.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A binding or mapping table names a system with no registered connector
    #[error("No connector registered for system '{system}'")]
    MissingConnector { system: String },

    /// Two connectors registered under one name
    #[error("Connector '{system}' registered more than once")]
    DuplicateConnector { system: String },

    /// Resource type has no mapping table
    #[error("No mapping table configured for resource type '{resource_type}'")]
    MissingMapping { resource_type: String },

    /// Mapping table is inconsistent with the schema registry
    #[error("Invalid mapping for '{resource_type}': {message}")]
    InvalidMapping {
        resource_type: String,
        message: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Schema registration failed
    #[error("Schema registration failed: {0}")]
    Schema(#[from] ScimError),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ScimError {
    /// Create a resource not found error
    pub fn resource_not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid syntax error
    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn no_target(message: impl Into<String>) -> Self {
        Self::NoTarget {
            message: message.into(),
        }
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ScimError::InvalidFilter { .. }
            | ScimError::InvalidSyntax { .. }
            | ScimError::InvalidPath { .. }
            | ScimError::Validation(_)
            | ScimError::UnknownResourceType(_)
            | ScimError::UnknownAttribute { .. }
            | ScimError::Mutability { .. }
            | ScimError::NoTarget { .. }
            | ScimError::TooMany { .. }
            | ScimError::Json(_) => 400,
            ScimError::Forbidden { .. } => 403,
            ScimError::ResourceNotFound { .. }
            | ScimError::SchemaNotFound { .. }
            | ScimError::EndpointNotFound { .. } => 404,
            ScimError::MethodNotAllowed { .. } => 405,
            ScimError::Uniqueness { .. } => 409,
            ScimError::NotImplemented { .. } => 501,
            ScimError::BackendUnavailable { .. } => 503,
            ScimError::Timeout { .. } => 504,
            ScimError::DuplicateSchema { .. }
            | ScimError::IncompleteMapping { .. }
            | ScimError::Mapping { .. }
            | ScimError::Internal { .. } => 500,
        }
    }

    /// RFC 7644 `scimType` keyword, when one applies.
    pub fn scim_type(&self) -> Option<ScimType> {
        match self {
            ScimError::InvalidFilter { .. } => Some(ScimType::InvalidFilter),
            ScimError::InvalidSyntax { .. } | ScimError::Json(_) => Some(ScimType::InvalidSyntax),
            ScimError::InvalidPath { .. } | ScimError::UnknownAttribute { .. } => {
                Some(ScimType::InvalidPath)
            }
            ScimError::Validation(_) => Some(ScimType::InvalidValue),
            ScimError::Mutability { .. } => Some(ScimType::Mutability),
            ScimError::NoTarget { .. } => Some(ScimType::NoTarget),
            ScimError::Uniqueness { .. } => Some(ScimType::Uniqueness),
            ScimError::TooMany { .. } => Some(ScimType::TooMany),
            _ => None,
        }
    }

    /// Whether this error indicates adapter misconfiguration rather than a
    /// client fault. Such errors are logged at error level by the dispatcher.
    pub fn is_internal_defect(&self) -> bool {
        matches!(
            self,
            ScimError::IncompleteMapping { .. }
                | ScimError::Mapping { .. }
                | ScimError::DuplicateSchema { .. }
                | ScimError::Internal { .. }
        )
    }

    /// Render the SCIM error body for this error.
    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse::from(self)
    }
}

impl ValidationError {
    /// Create a missing required attribute error
    pub fn missing_required(attribute: impl Into<String>) -> Self {
        Self::MissingRequiredAttribute {
            attribute: attribute.into(),
        }
    }

    /// Create an invalid type error
    pub fn invalid_type(
        attribute: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidDataType {
            attribute: attribute.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a custom validation error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

// Result type aliases for convenience
pub type ScimResult<T> = Result<T, ScimError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type BuildResult<T> = Result<T, BuildError>;
