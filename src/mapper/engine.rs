//! Table-driven conversion between backend records and SCIM resources.
//!
//! A [`ResourceMapper`] is compiled once from a [`MappingTable`] at build
//! time, when every SCIM path is resolved against the schema registry and
//! every transform name against the [`TransformRegistry`]. Conversions are
//! pure after that.

use super::table::{MappingEntry, MappingTable};
use super::transform::{Transform, TransformRegistry};
use crate::error::{BuildError, BuildResult, ScimError, ScimResult, ValidationError};
use crate::filter::{AttributePath, CompareOp, FilterNode, FilterParser, FilterValue, LogicalOp};
use crate::resource::{ResourceVersion, ScimResource};
use crate::schema::{SchemaRegistry, lookup_ignore_case};

use log::warn;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// `to_scim` produced a resource lacking required attributes.
///
/// `partial` is the resource as far as the table could fill it in.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteMapping {
    pub resource_type: String,
    pub missing: Vec<String>,
    pub partial: ScimResource,
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("{} record is missing required attributes: {}", .0.resource_type, .0.missing.join(", "))]
    Incomplete(Box<IncompleteMapping>),

    #[error("Backend record is not a JSON object")]
    NotAnObject,

    #[error("Transform '{transform}' failed for '{path}': {message}")]
    Transform {
        transform: String,
        path: String,
        message: String,
    },

    #[error("Cannot place '{path}': {message}")]
    Conflict { path: String, message: String },
}

impl From<MappingError> for ScimError {
    fn from(error: MappingError) -> Self {
        match error {
            MappingError::Incomplete(incomplete) => ScimError::IncompleteMapping {
                resource_type: incomplete.resource_type,
                missing: incomplete.missing,
            },
            other => ScimError::mapping(other.to_string()),
        }
    }
}

/// Where a mapped value lives in the SCIM representation.
#[derive(Debug, Clone)]
struct ScimTarget {
    /// Extension URN when the attribute is not in the core schema
    extension: Option<String>,
    name: String,
    /// Equality conditions selecting one element of a multi-valued attribute
    selector: Option<Vec<(String, Value)>>,
    sub: Option<String>,
    /// `schema-id:relative.path`, for matching filter paths
    key: String,
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    scim_path: String,
    target: ScimTarget,
    backend: Vec<String>,
    transform: Option<Transform>,
    /// The mapped value compares case-sensitively
    case_exact: bool,
}

impl CompiledEntry {
    fn is_version(&self) -> bool {
        self.target.extension.is_none()
            && self.target.name.eq_ignore_ascii_case("meta")
            && self
                .target
                .sub
                .as_deref()
                .is_some_and(|sub| sub.eq_ignore_ascii_case("version"))
    }

    fn transform_name(&self) -> String {
        self.transform
            .as_ref()
            .map(|t| t.name().to_string())
            .unwrap_or_default()
    }
}

/// Converts records of one backend system to and from one SCIM resource
/// type.
#[derive(Debug, Clone)]
pub struct ResourceMapper {
    table: MappingTable,
    core_schema: String,
    extensions: Vec<String>,
    required: Vec<String>,
    entries: Vec<CompiledEntry>,
}

impl ResourceMapper {
    /// Compile `table`, checking it against the registered schemas and
    /// transforms.
    pub fn new(
        table: MappingTable,
        registry: &SchemaRegistry,
        transforms: &TransformRegistry,
    ) -> BuildResult<Self> {
        let invalid = |message: String| BuildError::InvalidMapping {
            resource_type: table.resource_type.clone(),
            message,
        };

        let resource_type = registry
            .resource_type(&table.resource_type)
            .map_err(|e| invalid(e.to_string()))?;
        let core = registry
            .lookup(&resource_type.name)
            .map_err(|e| invalid(e.to_string()))?;

        let mut required: Vec<String> = core
            .attributes
            .iter()
            .filter(|attr| attr.required)
            .map(|attr| attr.name.clone())
            .collect();
        required.extend(
            resource_type
                .schema_extensions
                .iter()
                .filter(|ext| ext.required)
                .map(|ext| ext.schema.clone()),
        );
        let extensions = registry
            .extensions(&resource_type.name)
            .map_err(|e| invalid(e.to_string()))?
            .into_iter()
            .map(|schema| schema.id.clone())
            .collect();

        let parser = FilterParser::scoped(registry, &resource_type.name);
        let mut entries = Vec::with_capacity(table.entries.len());
        let mut seen_backend = HashSet::new();
        let mut seen_scim = HashSet::new();

        for entry in &table.entries {
            let compiled = compile_entry(entry, &parser, registry, &resource_type.name, &core.id, transforms)
                .map_err(|message| invalid(format!("'{}': {}", entry.scim_path, message)))?;

            if !seen_backend.insert(compiled.backend.join(".")) {
                return Err(invalid(format!(
                    "backend path '{}' is mapped more than once",
                    entry.backend_path
                )));
            }
            let scim_key = format!("{}{:?}", compiled.target.key, compiled.target.selector);
            if !seen_scim.insert(scim_key.to_ascii_lowercase()) {
                return Err(invalid(format!(
                    "SCIM path '{}' is mapped more than once",
                    entry.scim_path
                )));
            }
            entries.push(compiled);
        }

        if let Some(catch_all) = &table.catch_all {
            let clashes = core.attribute(catch_all).is_some()
                || ["schemas", "id", "externalId", "meta"]
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(catch_all));
            if clashes || catch_all.is_empty() {
                return Err(invalid(format!(
                    "catch-all key '{}' collides with a schema attribute",
                    catch_all
                )));
            }
        }

        Ok(Self {
            core_schema: core.id.clone(),
            table,
            extensions,
            required,
            entries,
        })
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn resource_type(&self) -> &str {
        &self.table.resource_type
    }

    pub fn system(&self) -> &str {
        &self.table.system
    }

    pub fn catch_all(&self) -> Option<&str> {
        self.table.catch_all.as_deref()
    }

    /// Build a SCIM resource from a backend record.
    ///
    /// Null and absent backend fields leave their attribute unset. Fields no
    /// entry maps are dropped, or collected under the catch-all key when the
    /// table has one.
    pub fn to_scim(&self, record: &Value) -> Result<ScimResource, MappingError> {
        let obj = record.as_object().ok_or(MappingError::NotAnObject)?;
        let mut scim = Map::new();
        let mut consumed = HashSet::new();

        for entry in &self.entries {
            consumed.insert(entry.backend[0].as_str());
            let Some(raw) = backend_get(obj, &entry.backend).filter(|v| !v.is_null()) else {
                continue;
            };
            let value = match &entry.transform {
                Some(transform) => transform.to_scim(raw).map_err(|message| MappingError::Transform {
                    transform: entry.transform_name(),
                    path: entry.scim_path.clone(),
                    message,
                })?,
                None => raw.clone(),
            };
            entry
                .target
                .write(&mut scim, value)
                .map_err(|message| MappingError::Conflict {
                    path: entry.scim_path.clone(),
                    message,
                })?;
        }

        if let Some(catch_all) = &self.table.catch_all {
            let extra: Map<String, Value> = obj
                .iter()
                .filter(|(key, _)| !consumed.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if !extra.is_empty() {
                scim.insert(catch_all.clone(), Value::Object(extra));
            }
        }

        let mut schemas = vec![Value::String(self.core_schema.clone())];
        schemas.extend(
            self.extensions
                .iter()
                .filter(|urn| scim.contains_key(urn.as_str()))
                .map(|urn| Value::String(urn.clone())),
        );
        scim.insert("schemas".to_string(), Value::Array(schemas));

        let resource = ScimResource::from_json(self.table.resource_type.clone(), &Value::Object(scim))
            .map_err(|e| MappingError::Conflict {
                path: "meta".to_string(),
                message: e.to_string(),
            })?;

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| resource.get(name).is_none_or(Value::is_null))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(MappingError::Incomplete(Box::new(IncompleteMapping {
                resource_type: self.table.resource_type.clone(),
                missing,
                partial: resource,
            })));
        }

        Ok(resource)
    }

    /// Build a backend record from a SCIM resource.
    ///
    /// A value the reverse transform rejects came from the client and fails
    /// as an invalid value.
    pub fn to_backend(&self, resource: &ScimResource) -> ScimResult<Value> {
        let scim = resource.to_object();
        let mut backend = Map::new();

        for entry in &self.entries {
            let Some(value) = entry.target.read(&scim).filter(|v| !v.is_null()) else {
                continue;
            };
            let value = match value.as_str() {
                // meta.version renders as an ETag; the backend stores the opaque value
                Some(etag) if entry.is_version() => match etag.parse::<ResourceVersion>() {
                    Ok(version) => Value::String(version.as_str().to_string()),
                    Err(_) => value.clone(),
                },
                _ => value.clone(),
            };
            let value = match &entry.transform {
                Some(transform) => transform.to_backend(&value).map_err(|message| {
                    ValidationError::custom(format!("{}: {}", entry.scim_path, message))
                })?,
                None => value,
            };
            backend_set(&mut backend, &entry.backend, value).map_err(ScimError::mapping)?;
        }

        if let Some(catch_all) = &self.table.catch_all {
            if let Some(Value::Object(extra)) = lookup_ignore_case(&scim, catch_all) {
                for (key, value) in extra {
                    backend.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }

        Ok(Value::Object(backend))
    }

    /// Rewrite a SCIM filter over backend field paths.
    ///
    /// Returns `None` unless every referenced attribute has a plain,
    /// transform-free mapping to a backend path of at most two segments;
    /// the caller then filters in memory instead. String comparisons on
    /// `caseExact` attributes are never translated, since backends compare
    /// translated filters case-insensitively.
    pub fn translate_filter(&self, node: &FilterNode) -> Option<FilterNode> {
        match node {
            FilterNode::Comparison { path, op, value } => {
                let key = self.path_key(path);
                let entry = self.entries.iter().find(|entry| {
                    entry.target.selector.is_none()
                        && entry.target.key.eq_ignore_ascii_case(&key)
                        && entry.transform.as_ref().is_none_or(Transform::is_identity)
                })?;
                if entry.case_exact && matches!(value, Some(FilterValue::String(_))) {
                    return None;
                }
                let backend = match entry.backend.as_slice() {
                    [name] => AttributePath::simple(name.clone()),
                    [name, sub] => AttributePath::nested(name.clone(), sub.clone()),
                    _ => return None,
                };
                Some(FilterNode::Comparison {
                    path: backend,
                    op: *op,
                    value: value.clone(),
                })
            }
            FilterNode::Logical { op, children } => Some(FilterNode::Logical {
                op: *op,
                children: children
                    .iter()
                    .map(|child| self.translate_filter(child))
                    .collect::<Option<Vec<_>>>()?,
            }),
            FilterNode::Group(inner) => Some(FilterNode::Group(Box::new(self.translate_filter(inner)?))),
            FilterNode::ValuePath { .. } => None,
        }
    }

    fn path_key(&self, path: &AttributePath) -> String {
        format!(
            "{}:{}",
            path.urn.as_deref().unwrap_or(&self.core_schema),
            path.relative()
        )
    }
}

fn compile_entry(
    entry: &MappingEntry,
    parser: &FilterParser<'_>,
    registry: &SchemaRegistry,
    resource_type: &str,
    core_schema: &str,
    transforms: &TransformRegistry,
) -> Result<CompiledEntry, String> {
    let path = parser.parse_path(&entry.scim_path).map_err(|e| e.to_string())?;
    let attribute = &path.attribute;
    if attribute.is_schema_root() {
        return Err("a whole extension schema cannot be mapped to one field".to_string());
    }

    let top = AttributePath {
        urn: attribute.urn.clone(),
        name: attribute.name.clone(),
        sub_attribute: None,
    };
    let (_, definition) = registry
        .resolve(resource_type, &top.to_string())
        .map_err(|e| e.to_string())?;

    let selector = match &path.filter {
        Some(filter) => {
            if path.sub_attribute.is_none() {
                return Err("a value filter must be followed by a sub-attribute".to_string());
            }
            let mut conditions = Vec::new();
            if !equality_conditions(filter, &mut conditions) {
                return Err("value filters may only join 'eq' comparisons with 'and'".to_string());
            }
            Some(conditions)
        }
        None if definition.multi_valued && attribute.sub_attribute.is_some() => {
            return Err(format!(
                "'{}' is multi-valued; select one element with a value filter",
                definition.name
            ));
        }
        None => None,
    };

    let backend: Vec<String> = entry.backend_path.split('.').map(str::to_string).collect();
    if backend.iter().any(String::is_empty) {
        return Err(format!("invalid backend path '{}'", entry.backend_path));
    }

    let transform = match &entry.transform {
        Some(name) => Some(
            transforms
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown transform '{}'", name))?,
        ),
        None => None,
    };

    let extension = attribute
        .urn
        .clone()
        .filter(|urn| !urn.eq_ignore_ascii_case(core_schema));
    let key = format!(
        "{}:{}",
        attribute.urn.as_deref().unwrap_or(core_schema),
        attribute.relative()
    );

    let written = match attribute.sub_attribute.as_deref().or(path.sub_attribute.as_deref()) {
        Some(sub) => definition.sub_attribute(sub).unwrap_or(definition),
        None => definition,
    };

    Ok(CompiledEntry {
        scim_path: entry.scim_path.clone(),
        case_exact: written.case_exact,
        target: ScimTarget {
            extension,
            name: attribute.name.clone(),
            selector,
            sub: attribute
                .sub_attribute
                .clone()
                .or_else(|| path.sub_attribute.clone()),
            key,
        },
        backend,
        transform,
    })
}

/// Collect `sub eq literal` conditions joined by `and`.
fn equality_conditions(node: &FilterNode, out: &mut Vec<(String, Value)>) -> bool {
    match node {
        FilterNode::Comparison {
            path,
            op: CompareOp::Eq,
            value: Some(value),
        } if path.sub_attribute.is_none() => {
            out.push((path.name.clone(), value.to_json()));
            true
        }
        FilterNode::Logical {
            op: LogicalOp::And,
            children,
        } => children.iter().all(|child| equality_conditions(child, out)),
        FilterNode::Group(inner) => equality_conditions(inner, out),
        _ => false,
    }
}

impl ScimTarget {
    fn read<'a>(&self, scim: &'a Map<String, Value>) -> Option<&'a Value> {
        let container = match &self.extension {
            Some(urn) => lookup_ignore_case(scim, urn)?.as_object()?,
            None => scim,
        };
        let attribute = lookup_ignore_case(container, &self.name)?;
        let holder = match &self.selector {
            Some(conditions) => attribute
                .as_array()?
                .iter()
                .find(|element| selects(conditions, element))?,
            None => attribute,
        };
        match &self.sub {
            Some(sub) => lookup_ignore_case(holder.as_object()?, sub),
            None => Some(holder),
        }
    }

    fn write(&self, scim: &mut Map<String, Value>, value: Value) -> Result<(), String> {
        let container = match &self.extension {
            Some(urn) => object_entry(scim, urn)?,
            None => scim,
        };

        let Some(conditions) = &self.selector else {
            match &self.sub {
                Some(sub) => object_entry(container, &self.name)?.insert(sub.clone(), value),
                None => container.insert(self.name.clone(), value),
            };
            return Ok(());
        };

        let items = container
            .entry(self.name.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| format!("'{}' is not multi-valued", self.name))?;
        let index = match items.iter().position(|element| selects(conditions, element)) {
            Some(index) => index,
            None => {
                let element: Map<String, Value> = conditions.iter().cloned().collect();
                items.push(Value::Object(element));
                items.len() - 1
            }
        };
        if let (Some(sub), Some(element)) = (&self.sub, items[index].as_object_mut()) {
            element.insert(sub.clone(), value);
        }
        Ok(())
    }
}

/// Whether a multi-valued element satisfies every equality condition.
/// String comparisons ignore case.
fn selects(conditions: &[(String, Value)], element: &Value) -> bool {
    let Some(obj) = element.as_object() else {
        return false;
    };
    conditions.iter().all(|(name, expected)| {
        match (lookup_ignore_case(obj, name), expected) {
            (Some(Value::String(actual)), Value::String(expected)) => actual.eq_ignore_ascii_case(expected),
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    })
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>, String> {
    map.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| format!("'{}' is not an object", key))
}

fn backend_get<'a>(obj: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(obj.get(first)?, |current, segment| current.as_object()?.get(segment))
}

fn backend_set(obj: &mut Map<String, Value>, path: &[String], value: Value) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };
    let mut current = obj;
    for segment in parents {
        current = object_entry(current, segment).map_err(|e| {
            warn!("Backend path {} crosses a non-object field", path.join("."));
            format!("backend field {}", e)
        })?;
    }
    current.insert(last.clone(), value);
    Ok(())
}
