//! Single-resource handlers.
//!
//! Writes go through the schema first and the mapping second: a body is
//! validated, stripped of what the client may not set, translated to a
//! backend record and only then handed to the connector. PATCH fetches the
//! current record and applies every operation before anything is written,
//! so a failing operation never reaches the backend.

use super::{projection, without_catch_all};
use crate::dispatcher::{Dispatcher, Projection, RequestContext, ScimRequest, ScimResponse};
use crate::error::{ScimError, ScimResult};
use crate::mapper::MappingError;
use crate::patch::{PatchApplier, PatchRequest};
use crate::resource::{Meta, ScimResource};
use crate::schema::{
    AttributeDefinition, Mutability, OperationContext, Schema, SchemaRegistry, lookup_ignore_case,
};

use log::{debug, warn};
use serde_json::{Map, Value};

/// Handle `GET /{endpoint}/{id}`.
pub async fn handle_get(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
    id: &str,
) -> ScimResult<ScimResponse> {
    let projection = request_projection(dispatcher, request, context)?;
    let record = fetch(dispatcher, context, id).await?;
    let resource = dispatcher.render(context, &record)?;
    Ok(dispatcher.respond(context, &resource, 200, &projection))
}

/// Handle `POST /{endpoint}`.
pub async fn handle_create(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
) -> ScimResult<ScimResponse> {
    let projection = request_projection(dispatcher, request, context)?;
    let registry = dispatcher.registry();
    let body = request.body()?;
    registry.validate_resource(
        &context.resource_type,
        &without_catch_all(context, body),
        OperationContext::Create,
    )?;

    let mut resource = ScimResource::from_json(context.resource_type.clone(), body)?;
    resource.id = None;
    resource.meta = Meta::new(context.resource_type.clone());
    strip_read_only(registry, &context.resource_type, &mut resource.attributes)?;

    let record = context.mapper.to_backend(&resource)?;
    let resource_type = context.resource_type.clone();
    let created = dispatcher
        .invoke(context, "create", move |connector| async move {
            connector.create(&resource_type, record).await
        })
        .await?;

    let resource = dispatcher.render(context, &created)?;
    debug!(
        "Created {} '{}' on '{}' (request: '{}')",
        context.resource_type,
        resource.id().unwrap_or_default(),
        context.system,
        context.request_id
    );
    Ok(dispatcher.respond(context, &resource, 201, &projection))
}

/// Handle `PUT /{endpoint}/{id}`.
///
/// readOnly attributes in the body are ignored and keep their current
/// values. An immutable attribute that already has a value must be sent
/// unchanged or left out.
pub async fn handle_replace(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
    id: &str,
) -> ScimResult<ScimResponse> {
    let projection = request_projection(dispatcher, request, context)?;
    let registry = dispatcher.registry();
    let body = request.body()?;
    registry.validate_resource(
        &context.resource_type,
        &without_catch_all(context, body),
        OperationContext::Replace,
    )?;

    let current = existing(dispatcher, context, id).await?;
    let mut resource = ScimResource::from_json(context.resource_type.clone(), body)?;
    check_immutable(registry, &context.resource_type, &current, &resource)?;
    strip_read_only(registry, &context.resource_type, &mut resource.attributes)?;
    carry_over(registry, &context.resource_type, &current, &mut resource)?;
    resource.id = Some(id.to_string());
    resource.meta = current.meta.clone();
    if resource.schemas.is_empty() {
        resource.schemas = current.schemas.clone();
    }

    store(dispatcher, context, id, &resource, &projection).await
}

/// Handle `PATCH /{endpoint}/{id}`.
pub async fn handle_patch(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
    id: &str,
) -> ScimResult<ScimResponse> {
    let projection = request_projection(dispatcher, request, context)?;
    let registry = dispatcher.registry();
    let patch = PatchRequest::from_json(request.body()?, registry, &context.resource_type)?;

    let current = existing(dispatcher, context, id).await?;
    let patched = PatchApplier::new(registry, &context.resource_type)
        .with_no_target_policy(dispatcher.config().no_target_policy(&context.resource_type))
        .apply(&current.to_json(), &patch.operations)?;
    registry.validate_resource(
        &context.resource_type,
        &without_catch_all(context, &patched),
        OperationContext::Replace,
    )?;

    let mut resource = ScimResource::from_json(context.resource_type.clone(), &patched)?;
    resource.id = Some(id.to_string());
    resource.meta = current.meta;
    debug!(
        "Applied {} PATCH operation(s) to {} '{}' (request: '{}')",
        patch.operations.len(),
        context.resource_type,
        id,
        context.request_id
    );

    store(dispatcher, context, id, &resource, &projection).await
}

/// Handle `DELETE /{endpoint}/{id}`.
pub async fn handle_delete(
    dispatcher: &Dispatcher,
    context: &RequestContext,
    id: &str,
) -> ScimResult<ScimResponse> {
    let resource_type = context.resource_type.clone();
    let target = id.to_string();
    dispatcher
        .invoke(context, "delete", move |connector| async move {
            connector.delete(&resource_type, &target).await
        })
        .await?;
    debug!(
        "Deleted {} '{}' on '{}' (request: '{}')",
        context.resource_type, id, context.system, context.request_id
    );
    Ok(ScimResponse::no_content())
}

fn request_projection(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
) -> ScimResult<Projection> {
    projection(
        dispatcher,
        context,
        &request.list_param("attributes"),
        &request.list_param("excludedAttributes"),
    )
}

async fn fetch(dispatcher: &Dispatcher, context: &RequestContext, id: &str) -> ScimResult<Value> {
    let resource_type = context.resource_type.clone();
    let target = id.to_string();
    dispatcher
        .invoke(context, "get", move |connector| async move {
            connector.get(&resource_type, &target).await
        })
        .await
}

/// The current resource as the base of an update. A record the table only
/// partly covers still serves, since the update replaces it anyway.
async fn existing(
    dispatcher: &Dispatcher,
    context: &RequestContext,
    id: &str,
) -> ScimResult<ScimResource> {
    let record = fetch(dispatcher, context, id).await?;
    match context.mapper.to_scim(&record) {
        Ok(resource) => Ok(resource),
        Err(MappingError::Incomplete(incomplete)) => {
            warn!(
                "{} '{}' on '{}' lacks {}; updating from the partial resource (request: '{}')",
                context.resource_type,
                id,
                context.system,
                incomplete.missing.join(", "),
                context.request_id
            );
            Ok(incomplete.partial)
        }
        Err(e) => Err(e.into()),
    }
}

async fn store(
    dispatcher: &Dispatcher,
    context: &RequestContext,
    id: &str,
    resource: &ScimResource,
    projection: &Projection,
) -> ScimResult<ScimResponse> {
    let record = context.mapper.to_backend(resource)?;
    let resource_type = context.resource_type.clone();
    let target = id.to_string();
    let replaced = dispatcher
        .invoke(context, "replace", move |connector| async move {
            connector.replace(&resource_type, &target, record).await
        })
        .await?;
    let resource = dispatcher.render(context, &replaced)?;
    Ok(dispatcher.respond(context, &resource, 200, projection))
}

/// Drop attributes and sub-attributes the service provider owns.
fn strip_read_only(
    registry: &SchemaRegistry,
    resource_type: &str,
    attributes: &mut Map<String, Value>,
) -> ScimResult<()> {
    let core = registry.lookup(resource_type)?;
    let extensions = registry.extensions(resource_type)?;
    attributes.retain(|key, value| {
        if let Some(extension) = extensions.iter().find(|s| s.id.eq_ignore_ascii_case(key)) {
            if let Value::Object(inner) = value {
                strip_schema(extension, inner);
            }
            return true;
        }
        core.attribute(key)
            .is_none_or(|definition| keep_writable(definition, value))
    });
    Ok(())
}

fn strip_schema(schema: &Schema, obj: &mut Map<String, Value>) {
    obj.retain(|key, value| {
        schema
            .attribute(key)
            .is_none_or(|definition| keep_writable(definition, value))
    });
}

fn keep_writable(definition: &AttributeDefinition, value: &mut Value) -> bool {
    if definition.mutability == Mutability::ReadOnly {
        return false;
    }
    if definition.is_complex() {
        let strip = |element: &mut Value| {
            if let Value::Object(obj) = element {
                obj.retain(|key, _| {
                    definition
                        .sub_attribute(key)
                        .is_none_or(|sub| sub.mutability != Mutability::ReadOnly)
                });
            }
        };
        match value {
            Value::Array(items) => items.iter_mut().for_each(strip),
            other => strip(other),
        }
    }
    true
}

/// Reject a replacement that changes an immutable value already set.
fn check_immutable(
    registry: &SchemaRegistry,
    resource_type: &str,
    current: &ScimResource,
    replacement: &ScimResource,
) -> ScimResult<()> {
    let core = registry.lookup(resource_type)?;
    check_schema_immutable(core, &current.attributes, &replacement.attributes)?;
    for extension in registry.extensions(resource_type)? {
        let before = lookup_ignore_case(&current.attributes, &extension.id).and_then(Value::as_object);
        let after = lookup_ignore_case(&replacement.attributes, &extension.id).and_then(Value::as_object);
        if let (Some(before), Some(after)) = (before, after) {
            check_schema_immutable(extension, before, after)?;
        }
    }
    Ok(())
}

fn check_schema_immutable(
    schema: &Schema,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> ScimResult<()> {
    for definition in &schema.attributes {
        let (Some(old), Some(new)) = (
            lookup_ignore_case(before, &definition.name),
            lookup_ignore_case(after, &definition.name),
        ) else {
            continue;
        };
        if definition.mutability == Mutability::Immutable && !old.is_null() && old != new {
            return Err(ScimError::Mutability {
                attribute: definition.name.clone(),
                mutability: Mutability::Immutable,
            });
        }
        // Sub-attributes of single-valued complex attributes
        if let (false, Some(old), Some(new)) = (definition.multi_valued, old.as_object(), new.as_object()) {
            for sub in definition
                .sub_attributes
                .iter()
                .filter(|sub| sub.mutability == Mutability::Immutable)
            {
                let (Some(old_value), Some(new_value)) =
                    (lookup_ignore_case(old, &sub.name), lookup_ignore_case(new, &sub.name))
                else {
                    continue;
                };
                if !old_value.is_null() && old_value != new_value {
                    return Err(ScimError::Mutability {
                        attribute: format!("{}.{}", definition.name, sub.name),
                        mutability: Mutability::Immutable,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Keep server-owned values (readOnly) and immutable values the client
/// left out.
fn carry_over(
    registry: &SchemaRegistry,
    resource_type: &str,
    current: &ScimResource,
    replacement: &mut ScimResource,
) -> ScimResult<()> {
    let core = registry.lookup(resource_type)?;
    carry_schema(core, &current.attributes, &mut replacement.attributes);
    for extension in registry.extensions(resource_type)? {
        let Some(before) = lookup_ignore_case(&current.attributes, &extension.id).and_then(Value::as_object) else {
            continue;
        };
        let key = replacement
            .attributes
            .keys()
            .find(|key| key.eq_ignore_ascii_case(&extension.id))
            .cloned();
        if let Some(Value::Object(after)) = key.and_then(|key| replacement.attributes.get_mut(&key)) {
            carry_schema(extension, before, after);
        }
    }
    if replacement.external_id.is_none() {
        replacement.external_id = current.external_id.clone();
    }
    Ok(())
}

fn carry_schema(schema: &Schema, before: &Map<String, Value>, after: &mut Map<String, Value>) {
    for definition in &schema.attributes {
        let keep = match definition.mutability {
            Mutability::ReadOnly => true,
            Mutability::Immutable => lookup_ignore_case(after, &definition.name).is_none(),
            _ => false,
        };
        if !keep {
            continue;
        }
        if let Some(value) = lookup_ignore_case(before, &definition.name) {
            after.insert(definition.name.clone(), value.clone());
        }
    }
}
