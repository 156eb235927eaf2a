//! Endpoint handlers, grouped the way the routes are:
//! - single resources (get, create, replace, patch, delete)
//! - queries (list, search)
//! - discovery (schemas, resource types, service provider config)

pub mod crud;
pub mod discovery;
pub mod query;

use super::{Dispatcher, RequestContext, projection::Projection};
use crate::error::ScimResult;

use serde_json::Value;

/// Projection for a request from its `attributes` / `excludedAttributes`.
pub(crate) fn projection(
    dispatcher: &Dispatcher,
    context: &RequestContext,
    attributes: &[String],
    excluded: &[String],
) -> ScimResult<Projection> {
    Projection::parse(dispatcher.registry(), &context.resource_type, attributes, excluded)
}

/// A body as schema validation should see it: without the mapping's
/// catch-all key.
pub(crate) fn without_catch_all(context: &RequestContext, body: &Value) -> Value {
    let mut view = body.clone();
    if let (Some(key), Value::Object(obj)) = (context.mapper.catch_all(), &mut view) {
        obj.retain(|name, _| !name.eq_ignore_ascii_case(key));
    }
    view
}
