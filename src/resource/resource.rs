//! The SCIM resource representation exchanged between the mapper and the
//! dispatcher.
//!
//! A [`ScimResource`] lives for one request: it is produced from a backend
//! record (or a client body), rendered to JSON for the response, and then
//! dropped. Nothing here is persisted.

use super::version::ResourceVersion;
use crate::error::{ValidationError, ValidationResult};
use crate::schema::lookup_ignore_case;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Common resource metadata (RFC 7643 §3.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ResourceVersion>,
}

impl Meta {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }
}

/// A SCIM resource: the common attributes plus everything else as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ScimResource {
    /// Resource type name ("User", "Group")
    pub resource_type: String,
    pub schemas: Vec<String>,
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub meta: Meta,
    /// All other attributes, including extension objects keyed by URN
    pub attributes: Map<String, Value>,
}

impl ScimResource {
    pub fn new(resource_type: impl Into<String>, schemas: Vec<String>) -> Self {
        let resource_type = resource_type.into();
        Self {
            meta: Meta::new(resource_type.clone()),
            resource_type,
            schemas,
            id: None,
            external_id: None,
            attributes: Map::new(),
        }
    }

    /// Split a JSON body into common attributes and the rest.
    ///
    /// Common attribute names are matched case-insensitively. A body
    /// without `meta` gets one naming `resource_type`.
    pub fn from_json(resource_type: impl Into<String>, data: &Value) -> ValidationResult<Self> {
        let obj = data.as_object().ok_or(ValidationError::NotAnObject)?;
        let mut resource = Self::new(resource_type, Vec::new());

        for (key, value) in obj {
            match key.to_ascii_lowercase().as_str() {
                "schemas" => resource.schemas = extract_schemas(value)?,
                "id" => resource.id = extract_string("id", value)?,
                "externalid" => resource.external_id = extract_string("externalId", value)?,
                "meta" => {
                    resource.meta = serde_json::from_value(value.clone()).map_err(|e| {
                        ValidationError::custom(format!("Invalid meta: {}", e))
                    })?;
                    if resource.meta.resource_type.is_empty() {
                        resource.meta.resource_type = resource.resource_type.clone();
                    }
                }
                _ => {
                    resource.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(resource)
    }

    /// Render the resource as SCIM JSON, `meta` included.
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_object())
    }

    pub fn to_object(&self) -> Map<String, Value> {
        let mut result = self.content();
        if let Ok(meta) = serde_json::to_value(&self.meta) {
            result.insert("meta".to_string(), meta);
        }
        result
    }

    /// Everything except `meta`; the input to content versions.
    fn content(&self) -> Map<String, Value> {
        let mut result = self.attributes.clone();
        result.insert(
            "schemas".to_string(),
            Value::Array(self.schemas.iter().cloned().map(Value::String).collect()),
        );
        if let Some(id) = &self.id {
            result.insert("id".to_string(), Value::String(id.clone()));
        }
        if let Some(external_id) = &self.external_id {
            result.insert("externalId".to_string(), Value::String(external_id.clone()));
        }
        result
    }

    /// Case-insensitive attribute lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        lookup_ignore_case(&self.attributes, name)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The backend's version when it supplied one, otherwise a hash of the
    /// resource content.
    pub fn ensure_version(&mut self) -> &ResourceVersion {
        let content = Value::Object(self.content());
        self.meta
            .version
            .get_or_insert_with(|| ResourceVersion::from_json(&content))
    }
}

fn extract_schemas(value: &Value) -> ValidationResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::ExpectedMultiValue {
            attribute: "schemas".to_string(),
        })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ValidationError::invalid_type(
                    "schemas",
                    "string",
                    crate::schema::SchemaRegistry::get_value_type(item),
                )
            })
        })
        .collect()
}

fn extract_string(name: &str, value: &Value) -> ValidationResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        other => Err(ValidationError::invalid_type(
            name,
            "string",
            crate::schema::SchemaRegistry::get_value_type(other),
        )),
    }
}
