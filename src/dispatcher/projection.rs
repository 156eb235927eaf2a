//! Attribute projection for responses (RFC 7644 §3.9).
//!
//! `returned: never` attributes are dropped unconditionally, `returned:
//! always` attributes survive any projection, and `returned: request`
//! attributes appear only when named in `attributes`. `meta` is kept with
//! `id` and `schemas` so responses can always carry their ETag.

use crate::error::{ScimError, ScimResult};
use crate::filter::FilterParser;
use crate::schema::{AttributeDefinition, Returned, Schema, SchemaRegistry};

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    schema: String,
    /// Empty when the whole schema is selected
    name: String,
    sub: Option<String>,
}

impl Selector {
    fn selects_schema(&self, schema: &Schema) -> bool {
        self.name.is_empty() && self.schema.eq_ignore_ascii_case(&schema.id)
    }

    fn selects(&self, schema: &Schema, name: &str) -> bool {
        self.schema.eq_ignore_ascii_case(&schema.id) && self.name.eq_ignore_ascii_case(name)
    }
}

/// Parsed `attributes` and `excludedAttributes` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    attributes: Vec<Selector>,
    excluded: Vec<Selector>,
}

impl Projection {
    pub fn parse(
        registry: &SchemaRegistry,
        resource_type: &str,
        attributes: &[String],
        excluded: &[String],
    ) -> ScimResult<Self> {
        let core = registry.lookup(resource_type)?.id.clone();
        let parser = FilterParser::scoped(registry, resource_type);
        let selectors = |paths: &[String]| -> ScimResult<Vec<Selector>> {
            paths
                .iter()
                .map(|raw| {
                    let expression = parser
                        .parse_path(raw)
                        .map_err(|e| ScimError::invalid_path(raw.as_str(), e.message))?;
                    if expression.filter.is_some() {
                        return Err(ScimError::invalid_path(
                            raw.as_str(),
                            "value filters are not allowed here",
                        ));
                    }
                    let attribute = expression.attribute;
                    Ok(Selector {
                        schema: attribute.urn.unwrap_or_else(|| core.clone()),
                        name: attribute.name,
                        sub: attribute.sub_attribute.or(expression.sub_attribute),
                    })
                })
                .collect()
        };
        Ok(Self {
            attributes: selectors(attributes)?,
            excluded: selectors(excluded)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.excluded.is_empty()
    }

    /// Project a rendered resource.
    pub fn apply(&self, registry: &SchemaRegistry, resource_type: &str, resource: Value) -> Value {
        let Value::Object(obj) = resource else {
            return resource;
        };
        let Ok(core) = registry.lookup(resource_type) else {
            return Value::Object(obj);
        };
        let extensions = registry.extensions(resource_type).unwrap_or_default();

        let mut projected = Map::new();
        for (key, value) in obj {
            if ["schemas", "id", "meta"].iter().any(|k| k.eq_ignore_ascii_case(&key)) {
                projected.insert(key, value);
                continue;
            }
            if let Some(extension) = extensions.iter().find(|s| s.id.eq_ignore_ascii_case(&key)) {
                if let Value::Object(inner) = value {
                    let inner = self.project_schema(extension, inner);
                    if !inner.is_empty() {
                        projected.insert(key, Value::Object(inner));
                    }
                }
                continue;
            }
            if let Some(value) = self.project_attribute(core, core.attribute(&key), &key, value) {
                projected.insert(key, value);
            }
        }
        Value::Object(projected)
    }

    fn project_schema(&self, schema: &Schema, obj: Map<String, Value>) -> Map<String, Value> {
        obj.into_iter()
            .filter_map(|(key, value)| {
                self.project_attribute(schema, schema.attribute(&key), &key, value)
                    .map(|value| (key, value))
            })
            .collect()
    }

    fn project_attribute(
        &self,
        schema: &Schema,
        definition: Option<&AttributeDefinition>,
        name: &str,
        value: Value,
    ) -> Option<Value> {
        let returned = definition.map_or(Returned::Default, |d| d.returned);
        if returned == Returned::Never {
            return None;
        }
        let value = match definition {
            Some(definition) => strip_never(definition, value),
            None => value,
        };
        if returned == Returned::Always {
            return Some(value);
        }

        if !self.attributes.is_empty() {
            if self.attributes.iter().any(|s| s.selects_schema(schema)) {
                return Some(value);
            }
            let selected: Vec<&Selector> = self
                .attributes
                .iter()
                .filter(|s| s.selects(schema, name))
                .collect();
            if selected.is_empty() {
                return None;
            }
            if selected.iter().any(|s| s.sub.is_none()) {
                return Some(value);
            }
            let subs: Vec<&str> = selected.iter().filter_map(|s| s.sub.as_deref()).collect();
            return retain_subs(value, |key| subs.iter().any(|sub| sub.eq_ignore_ascii_case(key)));
        }

        if returned == Returned::Request {
            return None;
        }
        if self.excluded.iter().any(|s| s.selects_schema(schema)) {
            return None;
        }
        let excluded: Vec<&Selector> = self
            .excluded
            .iter()
            .filter(|s| s.selects(schema, name))
            .collect();
        if excluded.iter().any(|s| s.sub.is_none()) {
            return None;
        }
        if excluded.is_empty() {
            return Some(value);
        }
        let subs: Vec<&str> = excluded.iter().filter_map(|s| s.sub.as_deref()).collect();
        retain_subs(value, |key| !subs.iter().any(|sub| sub.eq_ignore_ascii_case(key)))
    }
}

fn strip_never(definition: &AttributeDefinition, value: Value) -> Value {
    let hidden: Vec<&str> = definition
        .sub_attributes
        .iter()
        .filter(|sub| sub.returned == Returned::Never)
        .map(|sub| sub.name.as_str())
        .collect();
    if hidden.is_empty() {
        return value;
    }
    retain_subs(value, |key| !hidden.iter().any(|h| h.eq_ignore_ascii_case(key))).unwrap_or(Value::Null)
}

/// Keep the sub-attributes `keep` accepts, in a complex value or in each
/// element of a multi-valued one. Empty results vanish.
fn retain_subs(value: Value, keep: impl Fn(&str) -> bool) -> Option<Value> {
    let retain = |element: Value| -> Option<Value> {
        match element {
            Value::Object(obj) => {
                let obj: Map<String, Value> = obj.into_iter().filter(|(key, _)| keep(key)).collect();
                (!obj.is_empty()).then_some(Value::Object(obj))
            }
            other => Some(other),
        }
    };
    match value {
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(retain).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        other => retain(other),
    }
}
