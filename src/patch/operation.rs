//! PATCH request parsing and validation (RFC 7644 §3.5.2).
//!
//! ```json
//! {
//!   "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!   "Operations": [
//!     { "op": "replace", "path": "displayName", "value": "New Name" },
//!     { "op": "add", "path": "emails", "value": [{"type": "home", "value": "home@example.com"}] },
//!     { "op": "remove", "path": "members[value eq \"user-123\"]" }
//!   ]
//! }
//! ```

use crate::error::{ScimError, ScimResult};
use crate::filter::{FilterParser, PathExpression};
use crate::schema::{SchemaRegistry, lookup_ignore_case};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Schema URI of PATCH request messages.
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A parsed PATCH path: `attrPath`, `attrPath[valFilter]` or
/// `attrPath[valFilter].subAttr`.
pub type PatchPath = PathExpression;

/// PATCH operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpType {
    Add,
    Remove,
    Replace,
}

impl PatchOpType {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "add" => Some(PatchOpType::Add),
            "remove" => Some(PatchOpType::Remove),
            "replace" => Some(PatchOpType::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for PatchOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatchOpType::Add => "add",
            PatchOpType::Remove => "remove",
            PatchOpType::Replace => "replace",
        })
    }
}

/// A single validated PATCH operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOpType,
    pub path: Option<PatchPath>,
    pub value: Option<Value>,
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}", self.op, path),
            None => write!(f, "{} <no path>", self.op),
        }
    }
}

/// An ordered sequence of PATCH operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatchRequest {
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    /// Parse a request body for a resource type.
    ///
    /// Accepts either a `PatchOp` message or a bare array of operations.
    /// Paths are resolved against the resource type's schemas.
    pub fn from_json(body: &Value, registry: &SchemaRegistry, resource_type: &str) -> ScimResult<Self> {
        let raw_operations = match body {
            Value::Array(operations) => operations,
            Value::Object(message) => {
                let schemas = message
                    .get("schemas")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ScimError::invalid_syntax("PATCH request must list its schemas"))?;
                let is_patch_op = schemas
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|uri| uri.eq_ignore_ascii_case(PATCH_OP_SCHEMA));
                if !is_patch_op {
                    return Err(ScimError::invalid_syntax(format!(
                        "PATCH request must include schema {}",
                        PATCH_OP_SCHEMA
                    )));
                }
                lookup_ignore_case(message, "Operations")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        ScimError::invalid_syntax("PATCH request must contain an 'Operations' array")
                    })?
            }
            _ => {
                return Err(ScimError::invalid_syntax(
                    "PATCH request must be an object or an array of operations",
                ));
            }
        };

        let parser = FilterParser::scoped(registry, resource_type);
        let operations = raw_operations
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                PatchOperation::parse(raw, &parser).map_err(|error| annotate(index, error))
            })
            .collect::<ScimResult<Vec<_>>>()?;

        Ok(Self { operations })
    }
}

impl PatchOperation {
    /// Parse and validate one operation object.
    pub fn parse(raw: &Value, parser: &FilterParser<'_>) -> ScimResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ScimError::invalid_syntax("PATCH operation must be an object"))?;

        let op_name = lookup_ignore_case(obj, "op")
            .and_then(Value::as_str)
            .ok_or_else(|| ScimError::invalid_syntax("PATCH operation must have an 'op' field"))?;
        let op = PatchOpType::from_name(op_name).ok_or_else(|| {
            ScimError::invalid_syntax(format!("Unsupported PATCH operation: {}", op_name))
        })?;

        let path = match lookup_ignore_case(obj, "path") {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) => Some(
                parser
                    .parse_path(path)
                    .map_err(|e| ScimError::invalid_path(path.as_str(), e.to_string()))?,
            ),
            Some(_) => return Err(ScimError::invalid_syntax("PATCH 'path' must be a string")),
        };

        let value = match lookup_ignore_case(obj, "value") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        };

        match op {
            PatchOpType::Remove => {
                if value.is_some() {
                    return Err(ScimError::invalid_syntax(
                        "remove operation must not carry a value",
                    ));
                }
                if path.is_none() {
                    return Err(ScimError::no_target("remove operation requires a path"));
                }
            }
            PatchOpType::Add | PatchOpType::Replace => {
                let Some(value) = &value else {
                    return Err(ScimError::invalid_syntax(format!(
                        "{} operation requires a value",
                        op
                    )));
                };
                if path.is_none() && !value.is_object() {
                    return Err(ScimError::invalid_syntax(format!(
                        "{} operation without a path requires an object value",
                        op
                    )));
                }
            }
        }

        Ok(Self { op, path, value })
    }
}

fn annotate(index: usize, error: ScimError) -> ScimError {
    match error {
        ScimError::InvalidSyntax { message } => {
            ScimError::invalid_syntax(format!("Operation {}: {}", index, message))
        }
        ScimError::NoTarget { message } => {
            ScimError::no_target(format!("Operation {}: {}", index, message))
        }
        other => other,
    }
}
