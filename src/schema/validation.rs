//! Schema validation logic for SCIM resources.
//!
//! Validates resource bodies against the core schema of their resource type
//! and any extension schemas registered for it: attribute types, single vs
//! multi-valued shape, canonical values, required attributes and complex
//! sub-attribute structure.

use super::registry::SchemaRegistry;
use super::types::{AttributeDefinition, AttributeType, Mutability, Schema};
use crate::error::{ScimResult, ValidationError, ValidationResult};
use serde_json::{Map, Value};

/// The operation a resource body is being validated for.
///
/// Required-attribute checks only apply to full representations; a PATCH
/// result is validated with [`OperationContext::Replace`] once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationContext {
    Create,
    Replace,
    /// Partial body, e.g. the value of a PATCH operation
    Partial,
}

impl OperationContext {
    fn checks_required(self) -> bool {
        !matches!(self, OperationContext::Partial)
    }
}

/// Top-level keys accepted on every resource without a schema definition.
const COMMON_KEYS: [&str; 1] = ["schemas"];

impl SchemaRegistry {
    /// Validate a resource body for the given resource type.
    pub fn validate_resource(
        &self,
        resource_type: &str,
        resource: &Value,
        context: OperationContext,
    ) -> ScimResult<()> {
        let core = self.lookup(resource_type)?;
        let rt = self.resource_type(resource_type)?;
        let extensions = self.extensions(resource_type)?;

        let obj = resource.as_object().ok_or(ValidationError::NotAnObject)?;

        self.validate_schemas_attribute(obj, core, &extensions)?;
        self.validate_against_schema(core, obj, context)?;

        for (key, value) in obj {
            if COMMON_KEYS.contains(&key.as_str()) || core.attribute(key).is_some() {
                continue;
            }
            match extensions
                .iter()
                .find(|ext| ext.id.eq_ignore_ascii_case(key))
            {
                Some(extension) => {
                    let ext_obj = value.as_object().ok_or_else(|| {
                        ValidationError::invalid_type(
                            key.as_str(),
                            "object",
                            Self::get_value_type(value),
                        )
                    })?;
                    self.validate_against_schema(extension, ext_obj, context)?;
                }
                None => {
                    return Err(ValidationError::UnknownAttribute {
                        attribute: key.clone(),
                        schema_id: core.id.clone(),
                    }
                    .into());
                }
            }
        }

        if context.checks_required() {
            for ext in rt.schema_extensions.iter().filter(|ext| ext.required) {
                let present = obj.keys().any(|key| key.eq_ignore_ascii_case(&ext.schema));
                if !present {
                    return Err(ValidationError::missing_required(ext.schema.as_str()).into());
                }
            }
        }

        Ok(())
    }

    /// Validate an object against every attribute a single schema defines.
    fn validate_against_schema(
        &self,
        schema: &Schema,
        obj: &Map<String, Value>,
        context: OperationContext,
    ) -> ValidationResult<()> {
        for attr_def in &schema.attributes {
            let value = lookup_ignore_case(obj, &attr_def.name);
            self.validate_attribute(attr_def, value, &attr_def.name, context)?;
        }
        Ok(())
    }

    /// `schemas`, when present, must only list URIs that belong to the
    /// resource type.
    fn validate_schemas_attribute(
        &self,
        obj: &Map<String, Value>,
        core: &Schema,
        extensions: &[&Schema],
    ) -> ValidationResult<()> {
        let Some(schemas) = obj.get("schemas") else {
            return Ok(());
        };
        let uris = schemas
            .as_array()
            .ok_or_else(|| ValidationError::ExpectedMultiValue {
                attribute: "schemas".to_string(),
            })?;

        for uri in uris {
            let uri = uri.as_str().ok_or_else(|| {
                ValidationError::invalid_type("schemas", "string", Self::get_value_type(uri))
            })?;
            let known = core.id.eq_ignore_ascii_case(uri)
                || extensions.iter().any(|ext| ext.id.eq_ignore_ascii_case(uri));
            if !known {
                return Err(ValidationError::UnknownSchemaUri {
                    uri: uri.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate a single attribute against its definition.
    fn validate_attribute(
        &self,
        attr_def: &AttributeDefinition,
        value: Option<&Value>,
        path: &str,
        context: OperationContext,
    ) -> ValidationResult<()> {
        // readOnly attributes are assigned by the service provider
        let enforce_required = attr_def.required
            && context.checks_required()
            && attr_def.mutability != Mutability::ReadOnly;

        let value = match value {
            None | Some(Value::Null) if enforce_required => {
                return Err(ValidationError::missing_required(path));
            }
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        if attr_def.multi_valued {
            let items = value
                .as_array()
                .ok_or_else(|| ValidationError::ExpectedMultiValue {
                    attribute: path.to_string(),
                })?;
            if enforce_required && items.is_empty() {
                return Err(ValidationError::missing_required(path));
            }
            for item in items {
                self.validate_attribute_value(attr_def, item, path, context)?;
            }
        } else {
            if value.is_array() {
                return Err(ValidationError::ExpectedSingleValue {
                    attribute: path.to_string(),
                });
            }
            self.validate_attribute_value(attr_def, value, path, context)?;
        }

        Ok(())
    }

    /// Validate one value (one element, for multi-valued attributes)
    /// against the attribute's type and constraints.
    fn validate_attribute_value(
        &self,
        attr_def: &AttributeDefinition,
        value: &Value,
        path: &str,
        context: OperationContext,
    ) -> ValidationResult<()> {
        let type_error = || {
            ValidationError::invalid_type(
                path,
                attr_def.data_type.to_string(),
                Self::get_value_type(value),
            )
        };

        match attr_def.data_type {
            AttributeType::String => {
                let text = value.as_str().ok_or_else(type_error)?;
                self.validate_canonical_value(attr_def, text, path)?;
            }
            AttributeType::Boolean => {
                value.as_bool().ok_or_else(type_error)?;
            }
            AttributeType::Integer => {
                if !(value.is_i64() || value.is_u64()) {
                    return Err(type_error());
                }
            }
            AttributeType::Decimal => {
                if !value.is_number() {
                    return Err(type_error());
                }
            }
            AttributeType::DateTime => {
                let text = value.as_str().ok_or_else(type_error)?;
                if !self.is_valid_datetime_format(text) {
                    return Err(ValidationError::InvalidDateTimeFormat {
                        attribute: path.to_string(),
                        value: text.to_string(),
                    });
                }
            }
            AttributeType::Binary => {
                let text = value.as_str().ok_or_else(type_error)?;
                if !self.is_valid_base64(text) {
                    return Err(ValidationError::InvalidBinaryData {
                        attribute: path.to_string(),
                        details: "not valid base64".to_string(),
                    });
                }
            }
            AttributeType::Reference => {
                let text = value.as_str().ok_or_else(type_error)?;
                if !self.is_valid_uri_format(text) {
                    return Err(ValidationError::InvalidReferenceUri {
                        attribute: path.to_string(),
                        uri: text.to_string(),
                    });
                }
            }
            AttributeType::Complex => {
                let obj = value.as_object().ok_or_else(type_error)?;
                self.validate_complex_value(attr_def, obj, path, context)?;
            }
        }

        Ok(())
    }

    fn validate_complex_value(
        &self,
        attr_def: &AttributeDefinition,
        obj: &Map<String, Value>,
        path: &str,
        context: OperationContext,
    ) -> ValidationResult<()> {
        for key in obj.keys() {
            if attr_def.sub_attribute(key).is_none() {
                return Err(ValidationError::UnknownAttribute {
                    attribute: format!("{}.{}", path, key),
                    schema_id: attr_def.name.clone(),
                });
            }
        }

        for sub_def in &attr_def.sub_attributes {
            let sub_path = format!("{}.{}", path, sub_def.name);
            let sub_value = lookup_ignore_case(obj, &sub_def.name);
            if sub_def.is_complex() {
                // Nested complex attributes are not permitted by RFC 7643 §2.3.8
                return Err(ValidationError::custom(format!(
                    "Sub-attribute '{}' cannot itself be complex",
                    sub_path
                )));
            }
            self.validate_attribute(sub_def, sub_value, &sub_path, context)?;
        }
        Ok(())
    }

    fn validate_canonical_value(
        &self,
        attr_def: &AttributeDefinition,
        value: &str,
        path: &str,
    ) -> ValidationResult<()> {
        if attr_def.canonical_values.is_empty() {
            return Ok(());
        }
        let allowed = attr_def
            .canonical_values
            .iter()
            .any(|canonical| canonical.eq_ignore_ascii_case(value));
        if allowed {
            Ok(())
        } else {
            Err(ValidationError::InvalidCanonicalValue {
                attribute: path.to_string(),
                value: value.to_string(),
                allowed: attr_def.canonical_values.clone(),
            })
        }
    }
}

/// Attribute names are case-insensitive in SCIM.
pub(crate) fn lookup_ignore_case<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}
