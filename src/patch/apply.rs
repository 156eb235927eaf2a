//! Applying PATCH operations to resource JSON.
//!
//! [`PatchApplier::apply`] never mutates its input: operations run against a
//! copy and the copy is only returned when every operation succeeded.

use super::operation::{PatchOpType, PatchOperation, PatchPath};
use crate::error::{ScimError, ScimResult, ValidationError};
use crate::filter::{AttributePath, CompareOp, FilterEvaluator, FilterNode, FilterParser};
use crate::schema::{AttributeDefinition, Mutability, SchemaRegistry};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to do when a `remove` or `replace` path selects nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoTargetPolicy {
    /// Fail the request with `noTarget`
    #[default]
    Error,
    /// Skip the operation
    Ignore,
}

/// Applies PATCH operations for one resource type.
#[derive(Debug, Clone, Copy)]
pub struct PatchApplier<'r> {
    registry: &'r SchemaRegistry,
    resource_type: &'r str,
    no_target: NoTargetPolicy,
}

/// The attribute an operation addresses and the definition of what it
/// ultimately writes (the sub-attribute, when the path names one).
struct Target<'r> {
    attribute: &'r AttributeDefinition,
    written: &'r AttributeDefinition,
}

impl<'r> PatchApplier<'r> {
    pub fn new(registry: &'r SchemaRegistry, resource_type: &'r str) -> Self {
        Self {
            registry,
            resource_type,
            no_target: NoTargetPolicy::default(),
        }
    }

    pub fn with_no_target_policy(mut self, policy: NoTargetPolicy) -> Self {
        self.no_target = policy;
        self
    }

    /// Apply `operations` in order to a copy of `resource`.
    ///
    /// All-or-nothing: the first failing operation aborts the whole request
    /// and `resource` is left as it was.
    pub fn apply(&self, resource: &Value, operations: &[PatchOperation]) -> ScimResult<Value> {
        let mut working = resource
            .as_object()
            .cloned()
            .ok_or(ValidationError::NotAnObject)?;

        for (index, operation) in operations.iter().enumerate() {
            if let Err(error) = self.apply_operation(&mut working, operation) {
                debug!(
                    "PATCH operation {} ({}) on {} failed: {}",
                    index, operation, self.resource_type, error
                );
                return Err(error);
            }
        }

        Ok(Value::Object(working))
    }

    fn parser(&self) -> FilterParser<'r> {
        FilterParser::scoped(self.registry, self.resource_type)
    }

    fn apply_operation(&self, obj: &mut Map<String, Value>, operation: &PatchOperation) -> ScimResult<()> {
        let value = operation.value.as_ref();
        match &operation.path {
            Some(path) if path.attribute.is_schema_root() => {
                self.apply_to_extension(obj, operation.op, &path.attribute, value)
            }
            Some(path) => self.apply_at(obj, operation.op, path, value),
            None => {
                let Some(Value::Object(members)) = value else {
                    return Err(ScimError::invalid_syntax(format!(
                        "{} operation without a path requires an object value",
                        operation.op
                    )));
                };
                for (key, member) in members {
                    if key.eq_ignore_ascii_case("schemas") {
                        continue;
                    }
                    let path = self.parse_key(key)?;
                    if path.attribute.is_schema_root() {
                        self.apply_to_extension(obj, operation.op, &path.attribute, Some(member))?;
                    } else {
                        self.apply_at(obj, operation.op, &path, Some(member))?;
                    }
                }
                Ok(())
            }
        }
    }

    fn parse_key(&self, key: &str) -> ScimResult<PatchPath> {
        self.parser()
            .parse_path(key)
            .map_err(|e| ScimError::invalid_path(key, e.to_string()))
    }

    /// Operation whose path is a whole extension schema.
    fn apply_to_extension(
        &self,
        obj: &mut Map<String, Value>,
        op: PatchOpType,
        root: &AttributePath,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let urn = root.urn.as_deref().unwrap_or_default();
        if op == PatchOpType::Remove {
            let key = existing_key(obj, urn);
            if obj.remove(&key).is_none() {
                return self.no_target(format!("{} has no value", urn));
            }
            remove_schema_uri(obj, urn);
            return Ok(());
        }

        let Some(Value::Object(members)) = value else {
            return Err(ValidationError::invalid_type(urn, "object", "non-object").into());
        };
        for (key, member) in members {
            let path = self.parse_key(&format!("{}:{}", urn, key))?;
            self.apply_at(obj, op, &path, Some(member))?;
        }
        Ok(())
    }

    fn apply_at(
        &self,
        obj: &mut Map<String, Value>,
        op: PatchOpType,
        path: &PatchPath,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let target = self.target(path)?;
        check_mutability(path, &target)?;

        let whole_elements = target.written.multi_valued
            && path.filter.is_none()
            && path.attribute.sub_attribute.is_none();
        let value = value
            .map(|v| prepare_value(path, target.written, v, whole_elements))
            .transpose()?;

        let Some(container) = self.container_mut(obj, &path.attribute, op != PatchOpType::Remove)? else {
            return self.no_target(format!("{} has no value", path));
        };

        let result = match &path.filter {
            None => self.apply_plain(container, op, path, &target, value.as_ref()),
            Some(filter) => self.apply_filtered(container, op, path, filter, &target, value.as_ref()),
        };

        self.prune_extension(obj, &path.attribute);
        result
    }

    fn target(&self, path: &PatchPath) -> ScimResult<Target<'r>> {
        let invalid = |e: ScimError| ScimError::invalid_path(path.to_string(), e.to_string());
        let top = AttributePath {
            urn: path.attribute.urn.clone(),
            name: path.attribute.name.clone(),
            sub_attribute: None,
        };
        let (_, attribute) = self
            .registry
            .resolve(self.resource_type, &top.to_string())
            .map_err(invalid)?;

        let sub = path
            .attribute
            .sub_attribute
            .as_deref()
            .or(path.sub_attribute.as_deref());
        let written = match sub {
            Some(sub) => attribute.sub_attribute(sub).ok_or_else(|| {
                ScimError::invalid_path(path.to_string(), format!("Unknown sub-attribute '{}'", sub))
            })?,
            None => attribute,
        };

        Ok(Target { attribute, written })
    }

    /// The object holding the addressed attribute: the resource itself, or
    /// an extension object (created on demand when `create` is set).
    fn container_mut<'o>(
        &self,
        obj: &'o mut Map<String, Value>,
        path: &AttributePath,
        create: bool,
    ) -> ScimResult<Option<&'o mut Map<String, Value>>> {
        let Some(urn) = path.urn.as_deref().filter(|urn| !self.is_core_schema(urn)) else {
            return Ok(Some(obj));
        };

        let key = existing_key(obj, urn);
        if !obj.contains_key(&key) {
            if !create {
                return Ok(None);
            }
            add_schema_uri(obj, urn);
            obj.insert(key.clone(), Value::Object(Map::new()));
        }

        match obj.get_mut(&key) {
            Some(Value::Object(extension)) => Ok(Some(extension)),
            _ => Err(ValidationError::invalid_type(urn, "object", "non-object").into()),
        }
    }

    fn is_core_schema(&self, urn: &str) -> bool {
        self.registry
            .lookup(self.resource_type)
            .is_ok_and(|schema| schema.id.eq_ignore_ascii_case(urn))
    }

    /// Drop an extension object left empty by a remove.
    fn prune_extension(&self, obj: &mut Map<String, Value>, path: &AttributePath) {
        let Some(urn) = path.urn.as_deref().filter(|urn| !self.is_core_schema(urn)) else {
            return;
        };
        let key = existing_key(obj, urn);
        let empty = obj
            .get(&key)
            .and_then(Value::as_object)
            .is_some_and(Map::is_empty);
        if empty {
            obj.remove(&key);
            remove_schema_uri(obj, urn);
        }
    }

    /// Path without a value filter.
    fn apply_plain(
        &self,
        container: &mut Map<String, Value>,
        op: PatchOpType,
        path: &PatchPath,
        target: &Target<'r>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let definition = target.attribute;
        let key = existing_key(container, &definition.name);

        let Some(sub) = &path.attribute.sub_attribute else {
            return match (op, value) {
                (PatchOpType::Remove, _) => match container.remove(&key) {
                    Some(_) => Ok(()),
                    None => self.no_target(format!("{} has no value", path)),
                },
                (op, Some(value)) if definition.multi_valued => {
                    let incoming = as_items(value);
                    let slot = container.entry(key).or_insert_with(|| Value::Array(Vec::new()));
                    if op == PatchOpType::Replace || !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(items) = slot {
                        let mut written = Vec::new();
                        for item in incoming {
                            if !items.contains(&item) {
                                items.push(item);
                                written.push(items.len() - 1);
                            }
                        }
                        normalise_primary(items, &written);
                    }
                    Ok(())
                }
                (_, Some(value)) if definition.is_complex() => {
                    let Value::Object(incoming) = value else {
                        return Err(ValidationError::invalid_type(
                            path.to_string(),
                            "complex",
                            SchemaRegistry::get_value_type(value),
                        )
                        .into());
                    };
                    let slot = container.entry(key).or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(existing) = slot {
                        merge_object(existing, incoming);
                    }
                    Ok(())
                }
                (_, Some(value)) => {
                    container.insert(key, value.clone());
                    Ok(())
                }
                (_, None) => Err(ScimError::invalid_syntax(format!("{} operation requires a value", op))),
            };
        };

        let sub_name = target.written.name.as_str();
        if definition.multi_valued {
            if op != PatchOpType::Remove {
                return Err(ScimError::invalid_path(
                    path.to_string(),
                    format!("'{}' is multi-valued; select elements with a value filter", definition.name),
                ));
            }
            let mut removed = false;
            if let Some(Value::Array(items)) = container.get_mut(&key) {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    let sub_key = existing_key(item, sub_name);
                    removed |= item.remove(&sub_key).is_some();
                }
            }
            return if removed {
                Ok(())
            } else {
                self.no_target(format!("{} has no value", path))
            };
        }

        match (op, value) {
            (PatchOpType::Remove, _) => {
                let removed = match container.get_mut(&key) {
                    Some(Value::Object(parent)) => {
                        let sub_key = existing_key(parent, sub);
                        parent.remove(&sub_key).is_some()
                    }
                    _ => false,
                };
                if !removed {
                    return self.no_target(format!("{} has no value", path));
                }
                let parent_empty = container
                    .get(&key)
                    .and_then(Value::as_object)
                    .is_some_and(Map::is_empty);
                if parent_empty {
                    container.remove(&key);
                }
                Ok(())
            }
            (_, Some(value)) => {
                let slot = container.entry(key).or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(parent) = slot {
                    let sub_key = existing_key(parent, sub_name);
                    parent.insert(sub_key, value.clone());
                }
                Ok(())
            }
            (_, None) => Err(ScimError::invalid_syntax(format!("{} operation requires a value", op))),
        }
    }

    /// Path with a value filter: the operation applies to each matching
    /// element of a multi-valued attribute.
    fn apply_filtered(
        &self,
        container: &mut Map<String, Value>,
        op: PatchOpType,
        path: &PatchPath,
        filter: &FilterNode,
        target: &Target<'r>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let key = existing_key(container, &target.attribute.name);
        let evaluator = FilterEvaluator::scoped(self.registry, self.resource_type);
        let parent = AttributePath {
            urn: path.attribute.urn.clone(),
            name: target.attribute.name.clone(),
            sub_attribute: None,
        };

        let matched: Vec<usize> = match container.get(&key) {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| evaluator.matches_element(filter, item, &parent))
                .map(|(index, _)| index)
                .collect(),
            _ => Vec::new(),
        };

        if matched.is_empty() {
            let seed = match (op, value) {
                (PatchOpType::Add, Some(value)) => {
                    seed_element(filter, path.sub_attribute.as_deref(), value)
                }
                _ => None,
            };
            let Some(seed) = seed else {
                return self.no_target(format!("no values of {} match", path));
            };
            let slot = container.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                items.push(seed);
                let written = [items.len() - 1];
                normalise_primary(items, &written);
            }
            return Ok(());
        }

        let Some(Value::Array(items)) = container.get_mut(&key) else {
            return Err(ScimError::internal(format!("{} changed during PATCH", path)));
        };

        match (op, &path.sub_attribute, value) {
            (PatchOpType::Remove, None, _) => {
                let mut index = 0;
                items.retain(|_| {
                    let keep = !matched.contains(&index);
                    index += 1;
                    keep
                });
                if items.is_empty() {
                    container.remove(&key);
                }
            }
            (PatchOpType::Remove, Some(sub), _) => {
                let mut removed = false;
                for &index in &matched {
                    if let Some(element) = items[index].as_object_mut() {
                        let sub_key = existing_key(element, sub);
                        removed |= element.remove(&sub_key).is_some();
                    }
                }
                if !removed {
                    return self.no_target(format!("{} has no value", path));
                }
            }
            (_, Some(_), Some(value)) => {
                let sub_name = target.written.name.as_str();
                for &index in &matched {
                    if let Some(element) = items[index].as_object_mut() {
                        let sub_key = existing_key(element, sub_name);
                        element.insert(sub_key, value.clone());
                    }
                }
                normalise_primary(items, &matched);
            }
            (op, None, Some(Value::Object(incoming))) => {
                for &index in &matched {
                    if op == PatchOpType::Add {
                        if let Some(element) = items[index].as_object_mut() {
                            merge_object(element, incoming);
                            continue;
                        }
                    }
                    items[index] = Value::Object(incoming.clone());
                }
                normalise_primary(items, &matched);
            }
            (op, None, Some(other)) => {
                return Err(ValidationError::invalid_type(
                    format!("{} ({})", path, op),
                    "complex",
                    SchemaRegistry::get_value_type(other),
                )
                .into());
            }
            (op, _, None) => {
                return Err(ScimError::invalid_syntax(format!("{} operation requires a value", op)));
            }
        }

        Ok(())
    }

    fn no_target(&self, message: String) -> ScimResult<()> {
        match self.no_target {
            NoTargetPolicy::Error => Err(ScimError::no_target(message)),
            NoTargetPolicy::Ignore => {
                debug!("Ignoring PATCH operation without target: {}", message);
                Ok(())
            }
        }
    }
}

/// readOnly and immutable attributes cannot be targeted by PATCH.
fn check_mutability(path: &PatchPath, target: &Target<'_>) -> ScimResult<()> {
    for definition in [target.attribute, target.written] {
        if matches!(
            definition.mutability,
            Mutability::ReadOnly | Mutability::Immutable
        ) {
            return Err(ScimError::Mutability {
                attribute: path.to_string(),
                mutability: definition.mutability,
            });
        }
    }
    Ok(())
}

/// Strip readOnly sub-attributes from complex values. Immutable
/// sub-attributes may only be supplied as part of whole new elements.
fn prepare_value(
    path: &PatchPath,
    definition: &AttributeDefinition,
    value: &Value,
    whole_elements: bool,
) -> ScimResult<Value> {
    if !definition.is_complex() {
        return Ok(value.clone());
    }

    let clean = |element: &Value| -> ScimResult<Value> {
        let Value::Object(members) = element else {
            return Ok(element.clone());
        };
        let mut kept = Map::new();
        for (key, member) in members {
            match definition.sub_attribute(key).map(|sub| sub.mutability) {
                Some(Mutability::ReadOnly) => continue,
                Some(mutability @ Mutability::Immutable) if !whole_elements => {
                    return Err(ScimError::Mutability {
                        attribute: format!("{}.{}", path, key),
                        mutability,
                    });
                }
                _ => {
                    kept.insert(key.clone(), member.clone());
                }
            }
        }
        Ok(Value::Object(kept))
    };

    match value {
        Value::Array(items) => Ok(Value::Array(
            items.iter().map(clean).collect::<ScimResult<Vec<_>>>()?,
        )),
        other => clean(other),
    }
}

/// Element created by `add` when an equality value filter
/// matches nothing: `emails[type eq "work"].value` seeds
/// `{"type": "work", "value": ...}`.
fn seed_element(filter: &FilterNode, sub_attribute: Option<&str>, value: &Value) -> Option<Value> {
    let FilterNode::Comparison {
        path,
        op: CompareOp::Eq,
        value: Some(literal),
    } = filter
    else {
        return None;
    };
    if path.sub_attribute.is_some() || literal.to_json().is_null() {
        return None;
    }

    let mut element = match (sub_attribute, value) {
        (Some(sub), value) => {
            let mut element = Map::new();
            element.insert(sub.to_string(), value.clone());
            element
        }
        (None, Value::Object(members)) => members.clone(),
        (None, _) => return None,
    };
    element.insert(path.name.clone(), literal.to_json());
    Some(Value::Object(element))
}

/// Key already used in `obj` for `name` (compared case-insensitively), or
/// `name` itself.
fn existing_key(obj: &Map<String, Value>, name: &str) -> String {
    obj.keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

fn merge_object(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        let key = existing_key(existing, key);
        existing.insert(key, value.clone());
    }
}

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// At most one element may be primary; the most recently written wins.
fn normalise_primary(items: &mut [Value], written: &[usize]) {
    let is_primary = |item: &Value| item.get("primary") == Some(&Value::Bool(true));
    let Some(&winner) = written
        .iter()
        .rev()
        .find(|&&index| items.get(index).is_some_and(is_primary))
    else {
        return;
    };

    for (index, item) in items.iter_mut().enumerate() {
        if index == winner || !is_primary(item) {
            continue;
        }
        if let Some(obj) = item.as_object_mut() {
            obj.insert("primary".to_string(), Value::Bool(false));
        }
    }
}

fn add_schema_uri(obj: &mut Map<String, Value>, urn: &str) {
    if let Some(Value::Array(schemas)) = obj.get_mut("schemas") {
        let listed = schemas
            .iter()
            .filter_map(Value::as_str)
            .any(|uri| uri.eq_ignore_ascii_case(urn));
        if !listed {
            schemas.push(Value::String(urn.to_string()));
        }
    }
}

fn remove_schema_uri(obj: &mut Map<String, Value>, urn: &str) {
    if let Some(Value::Array(schemas)) = obj.get_mut("schemas") {
        schemas.retain(|uri| !uri.as_str().is_some_and(|uri| uri.eq_ignore_ascii_case(urn)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScimType;
    use crate::patch::PatchRequest;
    use serde_json::json;

    const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    fn apply_with(
        resource_type: &str,
        resource: &Value,
        operations: Value,
        policy: NoTargetPolicy,
    ) -> ScimResult<Value> {
        let registry = SchemaRegistry::new().unwrap();
        let request = PatchRequest::from_json(&operations, &registry, resource_type)?;
        PatchApplier::new(&registry, resource_type)
            .with_no_target_policy(policy)
            .apply(resource, &request.operations)
    }

    fn apply(resource: &Value, operations: Value) -> ScimResult<Value> {
        apply_with("User", resource, operations, NoTargetPolicy::Error)
    }

    fn user() -> Value {
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "id": "2819c223",
            "userName": "bjensen",
            "name": { "givenName": "Robert", "familyName": "Jensen" },
            "emails": [
                { "type": "work", "value": "bjensen@example.com", "primary": true },
                { "type": "home", "value": "babs@example.com" }
            ]
        })
    }

    #[test]
    fn test_replace_sub_attribute() {
        let resource = json!({ "name": { "givenName": "Robert" } });
        let patched = apply(
            &resource,
            json!([{ "op": "replace", "path": "name.givenName", "value": "Bob" }]),
        )
        .unwrap();
        assert_eq!(patched, json!({ "name": { "givenName": "Bob" } }));
    }

    #[test]
    fn test_empty_operation_list_is_identity() {
        let resource = user();
        assert_eq!(apply(&resource, json!([])).unwrap(), resource);
    }

    #[test]
    fn test_add_without_path_merges_attributes() {
        let patched = apply(
            &user(),
            json!([{ "op": "add", "value": { "title": "Tour Guide", "name": { "middleName": "Ann" } } }]),
        )
        .unwrap();
        assert_eq!(patched["title"], "Tour Guide");
        assert_eq!(patched["name"]["middleName"], "Ann");
        assert_eq!(patched["name"]["givenName"], "Robert");
    }

    #[test]
    fn test_add_to_multi_valued_appends() {
        let patched = apply(
            &user(),
            json!([{
                "op": "add",
                "path": "emails",
                "value": [{ "type": "other", "value": "b@example.org", "primary": true }]
            }]),
        )
        .unwrap();
        let emails = patched["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 3);
        assert_eq!(emails[0]["primary"], false);
        assert_eq!(emails[2]["primary"], true);
    }

    #[test]
    fn test_replace_filtered_sub_attribute() {
        let patched = apply(
            &user(),
            json!([{ "op": "replace", "path": "emails[type eq \"work\"].value", "value": "new@example.com" }]),
        )
        .unwrap();
        assert_eq!(patched["emails"][0]["value"], "new@example.com");
        assert_eq!(patched["emails"][1]["value"], "babs@example.com");
    }

    #[test]
    fn test_add_filtered_path_without_match_seeds_element() {
        let patched = apply(
            &user(),
            json!([{ "op": "add", "path": "emails[type eq \"other\"].value", "value": "o@example.com" }]),
        )
        .unwrap();
        assert_eq!(
            patched["emails"][2],
            json!({ "type": "other", "value": "o@example.com" })
        );
    }

    #[test]
    fn test_replace_filtered_path_without_match_no_target() {
        let resource = json!({
            "userName": "bjensen",
            "emails": [{ "type": "work", "value": "bjensen@example.com" }]
        });
        let operations = json!([{ "op": "replace", "path": "emails[type eq \"home\"].value", "value": "h@example.com" }]);

        let error = apply(&resource, operations.clone()).unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::NoTarget));

        let patched = apply_with("User", &resource, operations, NoTargetPolicy::Ignore).unwrap();
        assert_eq!(patched, resource);
    }

    #[test]
    fn test_remove_missing_filtered_sub_attribute_no_target() {
        let operations = json!([{ "op": "remove", "path": "emails[type eq \"work\"].display" }]);

        let error = apply(&user(), operations.clone()).unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::NoTarget));

        let patched = apply_with("User", &user(), operations, NoTargetPolicy::Ignore).unwrap();
        assert_eq!(patched, user());

        let patched = apply(
            &user(),
            json!([{ "op": "remove", "path": "emails[type eq \"work\"].primary" }]),
        )
        .unwrap();
        assert!(patched["emails"][0].get("primary").is_none());
    }

    #[test]
    fn test_remove_filtered_elements() {
        let patched = apply(
            &user(),
            json!([{ "op": "remove", "path": "emails[type eq \"home\"]" }]),
        )
        .unwrap();
        assert_eq!(patched["emails"].as_array().unwrap().len(), 1);

        let patched = apply(
            &patched,
            json!([{ "op": "remove", "path": "emails[type eq \"work\"]" }]),
        )
        .unwrap();
        assert!(patched.get("emails").is_none());
    }

    #[test]
    fn test_remove_sub_attribute_prunes_empty_parent() {
        let resource = json!({ "userName": "bjensen", "name": { "givenName": "Robert" } });
        let patched = apply(
            &resource,
            json!([{ "op": "remove", "path": "name.givenName" }]),
        )
        .unwrap();
        assert_eq!(patched, json!({ "userName": "bjensen" }));
    }

    #[test]
    fn test_remove_missing_attribute_no_target() {
        let error = apply(&user(), json!([{ "op": "remove", "path": "nickName" }])).unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::NoTarget));

        let patched = apply_with(
            "User",
            &user(),
            json!([{ "op": "remove", "path": "nickName" }]),
            NoTargetPolicy::Ignore,
        )
        .unwrap();
        assert_eq!(patched, user());
    }

    #[test]
    fn test_read_only_attribute_rejected() {
        let error = apply(
            &user(),
            json!([{ "op": "replace", "path": "id", "value": "other" }]),
        )
        .unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::Mutability));
    }

    #[test]
    fn test_failed_operation_leaves_resource_unchanged() {
        let resource = user();
        let error = apply(
            &resource,
            json!([
                { "op": "replace", "path": "userName", "value": "babs" },
                { "op": "remove", "path": "nickName" }
            ]),
        )
        .unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::NoTarget));
        assert_eq!(resource, user());
    }

    #[test]
    fn test_group_member_value_is_immutable() {
        let group = json!({
            "displayName": "Tour Guides",
            "members": [{ "value": "2819c223", "display": "Babs" }]
        });
        let error = apply_with(
            "Group",
            &group,
            json!([{ "op": "replace", "path": "members[value eq \"2819c223\"].value", "value": "x" }]),
            NoTargetPolicy::Error,
        )
        .unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::Mutability));
    }

    #[test]
    fn test_add_members_strips_read_only_display() {
        let group = json!({ "displayName": "Tour Guides" });
        let patched = apply_with(
            "Group",
            &group,
            json!([{ "op": "add", "path": "members", "value": [{ "value": "2819c223", "display": "Babs" }] }]),
            NoTargetPolicy::Error,
        )
        .unwrap();
        assert_eq!(patched["members"], json!([{ "value": "2819c223" }]));

        let patched = apply_with(
            "Group",
            &patched,
            json!([{ "op": "remove", "path": "members[value eq \"2819c223\"]" }]),
            NoTargetPolicy::Error,
        )
        .unwrap();
        assert!(patched.get("members").is_none());
    }

    #[test]
    fn test_extension_attribute_creates_and_prunes_container() {
        let path = format!("{}:employeeNumber", ENTERPRISE);
        let patched = apply(
            &user(),
            json!([{ "op": "add", "path": path, "value": "701984" }]),
        )
        .unwrap();
        assert_eq!(patched[ENTERPRISE]["employeeNumber"], "701984");
        assert!(
            patched["schemas"]
                .as_array()
                .unwrap()
                .contains(&json!(ENTERPRISE))
        );

        let patched = apply(&patched, json!([{ "op": "remove", "path": path }])).unwrap();
        assert!(patched.get(ENTERPRISE).is_none());
        assert_eq!(patched["schemas"], user()["schemas"]);
    }

    #[test]
    fn test_multi_valued_sub_path_requires_filter_for_add() {
        let error = apply(
            &user(),
            json!([{ "op": "replace", "path": "emails.value", "value": "x@example.com" }]),
        )
        .unwrap_err();
        assert_eq!(error.scim_type(), Some(ScimType::InvalidPath));
    }
}
