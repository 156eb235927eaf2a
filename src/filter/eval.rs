//! In-memory filter evaluation against SCIM resource JSON.
//!
//! Used to select elements for PATCH value paths and to filter records for
//! connectors that cannot filter natively.

use super::ast::{AttributePath, CompareOp, FilterNode, FilterValue, LogicalOp};
use crate::schema::{AttributeDefinition, AttributeType, SchemaRegistry, lookup_ignore_case};

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// Which object attribute names are resolved against.
#[derive(Debug, Clone, Copy)]
enum Context<'r> {
    /// A whole resource
    Resource,
    /// One element of a complex attribute, inside a value filter
    Element(Option<&'r AttributeDefinition>),
}

/// Evaluates [`FilterNode`] trees.
///
/// A scoped evaluator consults attribute definitions: string comparisons
/// honour `caseExact` and `dateTime` attributes compare chronologically. An
/// unscoped evaluator compares strings case-insensitively and treats two
/// RFC 3339 timestamps as instants.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEvaluator<'r> {
    scope: Option<(&'r SchemaRegistry, &'r str)>,
}

impl<'r> FilterEvaluator<'r> {
    pub fn new() -> Self {
        Self { scope: None }
    }

    pub fn scoped(registry: &'r SchemaRegistry, resource_type: &'r str) -> Self {
        Self {
            scope: Some((registry, resource_type)),
        }
    }

    /// Whether `resource` satisfies `node`.
    pub fn matches(&self, node: &FilterNode, resource: &Value) -> bool {
        self.eval(node, resource, Context::Resource)
    }

    /// Whether one element of the multi-valued attribute `parent` satisfies
    /// a value filter.
    pub fn matches_element(&self, node: &FilterNode, element: &Value, parent: &AttributePath) -> bool {
        let definition = self.definition(parent, Context::Resource);
        self.eval(node, element, Context::Element(definition))
    }

    fn eval(&self, node: &FilterNode, target: &Value, context: Context<'r>) -> bool {
        match node {
            FilterNode::Comparison { path, op, value } => {
                let definition = self.definition(path, context);
                let values = attribute_values(target, path, context);
                evaluate_comparison(&values, *op, value.as_ref(), definition)
            }
            FilterNode::Logical { op, children } => match op {
                LogicalOp::And => children.iter().all(|c| self.eval(c, target, context)),
                LogicalOp::Or => children.iter().any(|c| self.eval(c, target, context)),
                LogicalOp::Not => !children.iter().all(|c| self.eval(c, target, context)),
            },
            FilterNode::Group(inner) => self.eval(inner, target, context),
            FilterNode::ValuePath { path, filter } => {
                let definition = self.definition(path, context);
                let Some(attribute) = container(target, path, context)
                    .and_then(|obj| lookup_ignore_case(obj, &path.name))
                else {
                    return false;
                };
                let element_context = Context::Element(definition);
                match attribute {
                    Value::Array(items) => items
                        .iter()
                        .any(|item| self.eval(filter, item, element_context)),
                    other => self.eval(filter, other, element_context),
                }
            }
        }
    }

    fn definition(&self, path: &AttributePath, context: Context<'r>) -> Option<&'r AttributeDefinition> {
        match context {
            Context::Resource => {
                let (registry, resource_type) = self.scope?;
                registry
                    .resolve(resource_type, &path.to_string())
                    .ok()
                    .map(|(_, definition)| definition)
            }
            Context::Element(parent) => {
                let attribute = parent?.sub_attribute(&path.name)?;
                match &path.sub_attribute {
                    Some(sub) => attribute.sub_attribute(sub),
                    None => Some(attribute),
                }
            }
        }
    }
}

/// The object an attribute name is looked up in: the resource itself, or
/// the extension object for URN-qualified extension paths.
fn container<'v>(
    target: &'v Value,
    path: &AttributePath,
    context: Context<'_>,
) -> Option<&'v serde_json::Map<String, Value>> {
    let obj = target.as_object()?;
    match (&path.urn, context) {
        (Some(urn), Context::Resource) => match lookup_ignore_case(obj, urn) {
            Some(Value::Object(extension)) => Some(extension),
            // Core schema URN: attributes live at the top level
            _ => Some(obj),
        },
        _ => Some(obj),
    }
}

/// Values a comparison is evaluated against. Multi-valued attributes yield
/// one value per element; elements of multi-valued complex attributes
/// compare by their `value` sub-attribute.
fn attribute_values<'v>(target: &'v Value, path: &AttributePath, context: Context<'_>) -> Vec<&'v Value> {
    let Some(attribute) = container(target, path, context)
        .and_then(|obj| lookup_ignore_case(obj, &path.name))
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    match (&path.sub_attribute, attribute) {
        (Some(sub), Value::Array(items)) => {
            for item in items {
                match item.as_object().and_then(|o| lookup_ignore_case(o, sub)) {
                    Some(Value::Array(nested)) => out.extend(nested.iter()),
                    Some(value) => out.push(value),
                    None => {}
                }
            }
        }
        (Some(sub), Value::Object(obj)) => match lookup_ignore_case(obj, sub) {
            Some(Value::Array(nested)) => out.extend(nested.iter()),
            Some(value) => out.push(value),
            None => {}
        },
        (Some(_), _) => {}
        (None, Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Object(obj) => out.extend(lookup_ignore_case(obj, "value")),
                    other => out.push(other),
                }
            }
        }
        (None, value) => out.push(value),
    }
    out
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(is_present),
        Value::Object(obj) => obj.values().any(is_present),
        _ => true,
    }
}

fn evaluate_comparison(
    values: &[&Value],
    op: CompareOp,
    expected: Option<&FilterValue>,
    definition: Option<&AttributeDefinition>,
) -> bool {
    let present = values.iter().any(|v| is_present(v));
    match (op, expected) {
        (CompareOp::Pr, _) | (_, None) => present,
        (CompareOp::Eq, Some(FilterValue::Null)) => !present,
        (CompareOp::Ne, Some(FilterValue::Null)) => present,
        (_, Some(FilterValue::Null)) => false,
        (CompareOp::Ne, Some(expected)) => !values
            .iter()
            .any(|actual| compare(actual, CompareOp::Eq, expected, definition)),
        (op, Some(expected)) => values
            .iter()
            .any(|actual| compare(actual, op, expected, definition)),
    }
}

fn compare(
    actual: &Value,
    op: CompareOp,
    expected: &FilterValue,
    definition: Option<&AttributeDefinition>,
) -> bool {
    match (actual, expected) {
        (Value::String(actual), FilterValue::String(expected)) => {
            if let Some(ordering) = compare_datetimes(actual, expected, definition) {
                return ordering_matches(op, ordering);
            }

            let case_exact = definition.is_some_and(|d| d.case_exact);
            let (actual, expected) = if case_exact {
                (actual.clone(), expected.clone())
            } else {
                (actual.to_lowercase(), expected.to_lowercase())
            };
            match op {
                CompareOp::Co => actual.contains(&expected),
                CompareOp::Sw => actual.starts_with(&expected),
                CompareOp::Ew => actual.ends_with(&expected),
                op => ordering_matches(op, actual.cmp(&expected)),
            }
        }
        (Value::Number(actual), FilterValue::Number(expected)) => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(e)) => a
                    .partial_cmp(&e)
                    .is_some_and(|ordering| ordering_matches(op, ordering)),
                _ => false,
            }
        }
        (Value::Bool(actual), FilterValue::Boolean(expected)) => match op {
            CompareOp::Eq => actual == expected,
            CompareOp::Ne => actual != expected,
            _ => false,
        },
        _ => false,
    }
}

/// Chronological ordering when the attribute is a `dateTime` (or, without a
/// schema, when both sides parse as one).
fn compare_datetimes(
    actual: &str,
    expected: &str,
    definition: Option<&AttributeDefinition>,
) -> Option<Ordering> {
    if definition.is_some_and(|d| d.data_type != AttributeType::DateTime) {
        return None;
    }
    let actual = DateTime::<FixedOffset>::parse_from_rfc3339(actual).ok()?;
    let expected = DateTime::<FixedOffset>::parse_from_rfc3339(expected).ok()?;
    Some(actual.cmp(&expected))
}

fn ordering_matches(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Co | CompareOp::Sw | CompareOp::Ew | CompareOp::Pr => false,
    }
}
