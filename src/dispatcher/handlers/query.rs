//! List and search handlers.
//!
//! Filtering and paging happen in the backend when the connector says it
//! can and the filter translates to backend fields. Anything else is done
//! here over the mapped SCIM resources, so the ListResponse numbers hold
//! whichever side did the work.

use super::projection;
use crate::connector::PageRequest;
use crate::dispatcher::{Dispatcher, ListResponse, Pagination, RequestContext, ScimRequest, ScimResponse};
use crate::error::{ScimError, ScimResult};
use crate::filter::{FilterEvaluator, FilterParser};
use crate::resource::ScimResource;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

pub const SEARCH_REQUEST_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:SearchRequest";

/// Query parameters of a list request or the body of a `.search` request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub schemas: Vec<String>,
    pub filter: Option<String>,
    pub start_index: Option<i64>,
    pub count: Option<i64>,
    pub attributes: Vec<String>,
    pub excluded_attributes: Vec<String>,
}

impl ListQuery {
    pub fn from_request(request: &ScimRequest) -> ScimResult<Self> {
        Ok(Self {
            schemas: Vec::new(),
            filter: request.query_param("filter").map(str::to_string),
            start_index: request.integer_param("startIndex")?,
            count: request.integer_param("count")?,
            attributes: request.list_param("attributes"),
            excluded_attributes: request.list_param("excludedAttributes"),
        })
    }

    pub fn from_search_body(body: &Value) -> ScimResult<Self> {
        let query: Self = serde_json::from_value(body.clone())
            .map_err(|e| ScimError::invalid_syntax(format!("Invalid SearchRequest: {}", e)))?;
        if !query
            .schemas
            .iter()
            .any(|schema| schema.eq_ignore_ascii_case(SEARCH_REQUEST_SCHEMA))
        {
            return Err(ScimError::invalid_syntax(format!(
                "SearchRequest must declare schema {}",
                SEARCH_REQUEST_SCHEMA
            )));
        }
        Ok(query)
    }
}

/// Handle `GET /{endpoint}`.
pub async fn handle_list(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
) -> ScimResult<ScimResponse> {
    execute(dispatcher, context, ListQuery::from_request(request)?).await
}

/// Handle `POST /{endpoint}/.search`.
pub async fn handle_search(
    dispatcher: &Dispatcher,
    request: &ScimRequest,
    context: &RequestContext,
) -> ScimResult<ScimResponse> {
    execute(dispatcher, context, ListQuery::from_search_body(request.body()?)?).await
}

async fn execute(
    dispatcher: &Dispatcher,
    context: &RequestContext,
    query: ListQuery,
) -> ScimResult<ScimResponse> {
    let registry = dispatcher.registry();
    let projection = projection(dispatcher, context, &query.attributes, &query.excluded_attributes)?;
    let filter = query
        .filter
        .as_deref()
        .map(|text| FilterParser::scoped(registry, &context.resource_type).parse(text))
        .transpose()?;
    let pagination = Pagination::new(query.start_index, query.count, dispatcher.config().max_results);

    let capabilities = context.connector.capabilities();
    let backend_filter = match &filter {
        Some(node) if capabilities.filtering => context.mapper.translate_filter(node),
        _ => None,
    };
    let filter_in_memory = filter.is_some() && backend_filter.is_none();
    let native_paging = capabilities.pagination && !filter_in_memory;
    let page = if native_paging {
        pagination.to_request()
    } else {
        PageRequest {
            start_index: 1,
            count: usize::MAX,
        }
    };
    debug!(
        "Listing {} on '{}' (backend filter: {}, in-memory filter: {}, backend paging: {}) (request: '{}')",
        context.resource_type,
        context.system,
        backend_filter.is_some(),
        filter_in_memory,
        native_paging,
        context.request_id
    );

    let resource_type = context.resource_type.clone();
    let listed = dispatcher
        .invoke(context, "list", move |connector| async move {
            connector.list(&resource_type, backend_filter.as_ref(), page).await
        })
        .await?;

    let (resources, summary) = match (&filter, filter_in_memory) {
        (Some(node), true) => {
            let evaluator = FilterEvaluator::scoped(registry, &context.resource_type);
            let mut matching: Vec<ScimResource> = Vec::new();
            for record in &listed.records {
                let resource = dispatcher.render(context, record)?;
                if evaluator.matches(node, &resource.to_json()) {
                    matching.push(resource);
                }
            }
            pagination.slice(matching)
        }
        _ => {
            let (records, summary) = if native_paging && listed.paged {
                pagination.backend_page(listed.records, listed.total_results)
            } else {
                pagination.slice(listed.records)
            };
            let resources = records
                .iter()
                .map(|record| dispatcher.render(context, record))
                .collect::<ScimResult<Vec<_>>>()?;
            (resources, summary)
        }
    };

    let body: Vec<Value> = resources
        .iter()
        .map(|resource| projection.apply(registry, &context.resource_type, resource.to_json()))
        .collect();
    let list = ListResponse::new(body, summary);
    Ok(ScimResponse::ok(serde_json::to_value(list)?))
}
