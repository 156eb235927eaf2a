//! Discovery endpoints (RFC 7644 §4): `/Schemas`, `/ResourceTypes` and
//! `/ServiceProviderConfig`. They describe the adapter itself and never
//! reach a connector.

use crate::dispatcher::{Dispatcher, ListResponse, ScimResponse};
use crate::error::{ScimError, ScimResult};
use crate::schema::Schema;

use serde_json::{Value, json};

pub const SERVICE_PROVIDER_CONFIG_SCHEMA: &str =
    "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";

/// Handle `GET /Schemas`.
pub fn handle_schemas(dispatcher: &Dispatcher) -> ScimResult<ScimResponse> {
    let mut schemas: Vec<&Schema> = dispatcher.registry().get_schemas();
    schemas.sort_by(|a, b| a.id.cmp(&b.id));
    let resources = schemas
        .into_iter()
        .map(|schema| schema_json(dispatcher, schema))
        .collect::<ScimResult<Vec<_>>>()?;
    Ok(ScimResponse::ok(serde_json::to_value(ListResponse::complete(resources))?))
}

/// Handle `GET /Schemas/{id}`.
pub fn handle_schema(dispatcher: &Dispatcher, id: &str) -> ScimResult<ScimResponse> {
    let schema = dispatcher
        .registry()
        .get_schemas()
        .into_iter()
        .find(|schema| schema.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| ScimError::SchemaNotFound {
            schema_id: id.to_string(),
        })?;
    Ok(ScimResponse::ok(schema_json(dispatcher, schema)?))
}

/// Handle `GET /ResourceTypes`.
pub fn handle_resource_types(dispatcher: &Dispatcher) -> ScimResult<ScimResponse> {
    let resources = dispatcher
        .registry()
        .resource_types()
        .iter()
        .map(|resource_type| resource_type_json(dispatcher, &resource_type.name))
        .collect::<ScimResult<Vec<_>>>()?;
    Ok(ScimResponse::ok(serde_json::to_value(ListResponse::complete(resources))?))
}

/// Handle `GET /ResourceTypes/{name}`.
pub fn handle_resource_type(dispatcher: &Dispatcher, name: &str) -> ScimResult<ScimResponse> {
    let known = dispatcher
        .registry()
        .resource_types()
        .iter()
        .find(|resource_type| resource_type.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ScimError::resource_not_found("ResourceType", name))?;
    Ok(ScimResponse::ok(resource_type_json(dispatcher, &known.name)?))
}

/// Handle `GET /ServiceProviderConfig`.
pub fn handle_service_provider_config(dispatcher: &Dispatcher) -> ScimResult<ScimResponse> {
    let config = dispatcher.config();
    let mut body = json!({
        "schemas": [SERVICE_PROVIDER_CONFIG_SCHEMA],
        "patch": { "supported": true },
        "bulk": { "supported": false, "maxOperations": 0, "maxPayloadSize": 0 },
        "filter": { "supported": true, "maxResults": config.max_results },
        "changePassword": { "supported": false },
        "sort": { "supported": false },
        "etag": { "supported": true },
        "authenticationSchemes": [],
        "meta": {
            "resourceType": "ServiceProviderConfig",
            "location": format!("{}/ServiceProviderConfig", config.base_url.trim_end_matches('/'))
        }
    });
    if let (Some(uri), Value::Object(obj)) = (&config.documentation_uri, &mut body) {
        obj.insert("documentationUri".to_string(), json!(uri));
    }
    Ok(ScimResponse::ok(body))
}

fn schema_json(dispatcher: &Dispatcher, schema: &Schema) -> ScimResult<Value> {
    let mut value = dispatcher.registry().schema_json(schema)?;
    set_location(dispatcher, &mut value, "Schemas", &schema.id);
    Ok(value)
}

fn resource_type_json(dispatcher: &Dispatcher, name: &str) -> ScimResult<Value> {
    let resource_type = dispatcher.registry().resource_type(name)?;
    let mut value = dispatcher.registry().resource_type_json(resource_type)?;
    set_location(dispatcher, &mut value, "ResourceTypes", &resource_type.name);
    Ok(value)
}

fn set_location(dispatcher: &Dispatcher, value: &mut Value, endpoint: &str, id: &str) {
    if let Some(meta) = value.get_mut("meta").and_then(Value::as_object_mut) {
        meta.insert(
            "location".to_string(),
            Value::String(dispatcher.config().location(endpoint, id)),
        );
    }
}
