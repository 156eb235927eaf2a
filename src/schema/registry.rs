//! Schema registry for loading, managing, and accessing SCIM schemas.
//!
//! The registry is populated once at startup and shared read-only for the
//! lifetime of the process. It resolves resource types to their core schema,
//! resolves attribute paths (including URN-qualified extension paths) to
//! attribute definitions, and backs the schema validation engine.

use super::{
    embedded,
    types::{AttributeDefinition, ResourceType, Schema},
};
use crate::error::{ScimError, ScimResult, ValidationError};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, FixedOffset};
use log::warn;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Schema URI of schema discovery documents.
pub const SCHEMA_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Schema";
/// Schema URI of resource type discovery documents.
pub const RESOURCE_TYPE_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";

/// Registry of SCIM schemas and resource types.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Keyed by lowercased schema id
    schemas: HashMap<String, Schema>,
    /// Registration order, for stable discovery output
    order: Vec<String>,
    resource_types: Vec<ResourceType>,
}

impl SchemaRegistry {
    /// Create a registry holding the embedded core schemas and the `User` and
    /// `Group` resource types.
    pub fn new() -> ScimResult<Self> {
        Self::with_embedded_schemas()
    }

    /// Create a registry with no schemas at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with the embedded User, Group and Enterprise User schemas.
    pub fn with_embedded_schemas() -> ScimResult<Self> {
        let mut registry = Self::empty();
        registry.register(Self::load_schema_from_str(embedded::core_user_schema())?)?;
        registry.register(Self::load_schema_from_str(embedded::core_group_schema())?)?;
        registry.register(Self::load_schema_from_str(
            embedded::enterprise_user_schema(),
        )?)?;

        registry.register_resource_type(
            ResourceType::new("User", "/Users", embedded::USER_SCHEMA)
                .with_extension(embedded::ENTERPRISE_USER_SCHEMA, false),
        )?;
        registry.register_resource_type(ResourceType::new(
            "Group",
            "/Groups",
            embedded::GROUP_SCHEMA,
        ))?;

        Ok(registry)
    }

    /// Parse a schema from its RFC 7643 JSON representation.
    pub fn load_schema_from_str(content: &str) -> ScimResult<Schema> {
        Ok(serde_json::from_str(content)?)
    }

    /// Register a schema.
    ///
    /// Fails if a schema with the same id is already present, if the schema
    /// declares the same attribute name twice at any level, or if a
    /// non-complex attribute declares sub-attributes.
    pub fn register(&mut self, schema: Schema) -> ScimResult<()> {
        let key = schema.id.to_ascii_lowercase();
        if self.schemas.contains_key(&key) {
            return Err(ScimError::DuplicateSchema {
                schema_id: schema.id,
            });
        }

        let duplicates = schema.duplicate_attribute_names();
        if !duplicates.is_empty() {
            return Err(ValidationError::custom(format!(
                "Schema '{}' declares duplicate attributes: {}",
                schema.id,
                duplicates.join(", ")
            ))
            .into());
        }

        let (not_complex, empty_complex) = schema.sub_attribute_mismatches();
        if !not_complex.is_empty() {
            return Err(ValidationError::custom(format!(
                "Schema '{}' declares sub-attributes on non-complex attributes: {}",
                schema.id,
                not_complex.join(", ")
            ))
            .into());
        }
        for path in empty_complex {
            warn!(
                "Complex attribute '{}' in schema '{}' has no sub-attributes",
                path, schema.id
            );
        }

        self.order.push(key.clone());
        self.schemas.insert(key, schema);
        Ok(())
    }

    /// Register a resource type. Its core schema and every extension schema
    /// must already be registered.
    pub fn register_resource_type(&mut self, resource_type: ResourceType) -> ScimResult<()> {
        if self.find_resource_type(&resource_type.name).is_some() {
            return Err(ScimError::internal(format!(
                "Resource type '{}' registered twice",
                resource_type.name
            )));
        }

        let referenced = std::iter::once(&resource_type.schema)
            .chain(resource_type.schema_extensions.iter().map(|ext| &ext.schema));
        for schema_id in referenced {
            if self.get_schema(schema_id).is_none() {
                return Err(ScimError::SchemaNotFound {
                    schema_id: schema_id.clone(),
                });
            }
        }

        self.resource_types.push(resource_type);
        Ok(())
    }

    /// Get all registered schemas in registration order.
    pub fn get_schemas(&self) -> Vec<&Schema> {
        self.order
            .iter()
            .filter_map(|key| self.schemas.get(key))
            .collect()
    }

    /// Get a specific schema by id (case-insensitive).
    pub fn get_schema(&self, id: &str) -> Option<&Schema> {
        self.schemas.get(&id.to_ascii_lowercase())
    }

    /// All registered resource types.
    pub fn resource_types(&self) -> &[ResourceType] {
        &self.resource_types
    }

    fn find_resource_type(&self, name_or_endpoint: &str) -> Option<&ResourceType> {
        let wanted = name_or_endpoint.trim_start_matches('/');
        self.resource_types.iter().find(|rt| {
            rt.name.eq_ignore_ascii_case(wanted) || rt.endpoint_name().eq_ignore_ascii_case(wanted)
        })
    }

    /// Resolve a resource type by name ("User") or endpoint ("/Users").
    pub fn resource_type(&self, name_or_endpoint: &str) -> ScimResult<&ResourceType> {
        self.find_resource_type(name_or_endpoint)
            .ok_or_else(|| ScimError::UnknownResourceType(name_or_endpoint.to_string()))
    }

    /// Core schema for a resource type.
    pub fn lookup(&self, resource_type: &str) -> ScimResult<&Schema> {
        let rt = self.resource_type(resource_type)?;
        self.get_schema(&rt.schema)
            .ok_or_else(|| ScimError::SchemaNotFound {
                schema_id: rt.schema.clone(),
            })
    }

    /// Extension schemas attached to a resource type.
    pub fn extensions(&self, resource_type: &str) -> ScimResult<Vec<&Schema>> {
        let rt = self.resource_type(resource_type)?;
        Ok(rt
            .schema_extensions
            .iter()
            .filter_map(|ext| self.get_schema(&ext.schema))
            .collect())
    }

    /// Resolve an attribute path within a single schema.
    ///
    /// `path` is dot-separated (`name.givenName`) and may carry the schema's
    /// own URN as a prefix. Matching is case-insensitive.
    pub fn attribute<'a>(&self, schema: &'a Schema, path: &str) -> ScimResult<&'a AttributeDefinition> {
        let unknown = || ScimError::UnknownAttribute {
            attribute: path.to_string(),
            schema_id: schema.id.clone(),
        };

        let relative = if path.len() > schema.id.len()
            && path[..schema.id.len()].eq_ignore_ascii_case(&schema.id)
            && path.as_bytes()[schema.id.len()] == b':'
        {
            &path[schema.id.len() + 1..]
        } else {
            path
        };

        let mut segments = relative.split('.');
        let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(unknown)?;
        let mut current = schema.attribute(first).ok_or_else(unknown)?;
        for segment in segments {
            current = current.sub_attribute(segment).ok_or_else(unknown)?;
        }
        Ok(current)
    }

    /// Split a possibly URN-qualified path into the schema it belongs to and
    /// the path relative to that schema.
    ///
    /// Unqualified paths belong to the resource type's core schema. A path
    /// that is exactly an extension URN resolves to that schema with an empty
    /// relative path.
    pub fn schema_for_path<'p>(
        &self,
        resource_type: &str,
        path: &'p str,
    ) -> ScimResult<(&Schema, &'p str)> {
        let core = self.lookup(resource_type)?;
        if !path.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("urn:")) {
            return Ok((core, path));
        }

        let candidates = std::iter::once(core).chain(self.extensions(resource_type)?);
        let mut best: Option<(&Schema, &'p str)> = None;
        for schema in candidates {
            let id_len = schema.id.len();
            let prefix_matches = path.len() >= id_len && path[..id_len].eq_ignore_ascii_case(&schema.id);
            if !prefix_matches {
                continue;
            }
            let rest = &path[id_len..];
            let relative = match rest.strip_prefix(':') {
                Some(relative) => relative,
                None if rest.is_empty() => rest,
                None => continue,
            };
            if best.is_none_or(|(current, _)| current.id.len() < id_len) {
                best = Some((schema, relative));
            }
        }

        best.ok_or_else(|| ScimError::UnknownAttribute {
            attribute: path.to_string(),
            schema_id: core.id.clone(),
        })
    }

    /// Resolve a path against a resource type, honouring extension URNs.
    pub fn resolve(
        &self,
        resource_type: &str,
        path: &str,
    ) -> ScimResult<(&Schema, &AttributeDefinition)> {
        let (schema, relative) = self.schema_for_path(resource_type, path)?;
        let definition = self.attribute(schema, relative)?;
        Ok((schema, definition))
    }

    /// Render a schema in its RFC 7643 §7 discovery form.
    pub fn schema_json(&self, schema: &Schema) -> ScimResult<Value> {
        let mut value = serde_json::to_value(schema)?;
        if let Value::Object(obj) = &mut value {
            obj.insert("schemas".to_string(), json!([SCHEMA_SCHEMA]));
            obj.insert("meta".to_string(), json!({ "resourceType": "Schema" }));
        }
        Ok(value)
    }

    /// Render a resource type in its RFC 7643 §6 discovery form.
    pub fn resource_type_json(&self, resource_type: &ResourceType) -> ScimResult<Value> {
        let mut value = serde_json::to_value(resource_type)?;
        if let Value::Object(obj) = &mut value {
            obj.insert("schemas".to_string(), json!([RESOURCE_TYPE_SCHEMA]));
            obj.insert("id".to_string(), json!(resource_type.name));
            obj.insert("meta".to_string(), json!({ "resourceType": "ResourceType" }));
        }
        Ok(value)
    }

    /// Validate datetime format using chrono's RFC3339 parser.
    pub(super) fn is_valid_datetime_format(&self, value: &str) -> bool {
        !value.is_empty() && DateTime::<FixedOffset>::parse_from_rfc3339(value).is_ok()
    }

    /// Validate base64 encoding by decoding it.
    pub(super) fn is_valid_base64(&self, value: &str) -> bool {
        !value.is_empty() && BASE64.decode(value).is_ok()
    }

    /// Validate URI format (basic scheme validation).
    ///
    /// Accepts absolute URLs, URNs and relative references to SCIM endpoints.
    pub(super) fn is_valid_uri_format(&self, value: &str) -> bool {
        !value.is_empty()
            && (value.contains("://") || value.starts_with("urn:") || !value.contains(' '))
    }

    /// Get the type name of a JSON value for error messages.
    pub(crate) fn get_value_type(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
