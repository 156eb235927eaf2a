//! Responses returned to the HTTP layer.

use super::pagination::PageSummary;
use crate::error::ScimError;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// Status and body, plus the header values a SCIM response carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScimResponse {
    pub status: u16,
    pub body: Option<Value>,
    /// `ETag` header value
    pub etag: Option<String>,
    /// `Location` header value
    pub location: Option<String>,
}

impl ScimResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            etag: None,
            location: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    pub fn created(body: Value) -> Self {
        Self::new(201, Some(body))
    }

    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    pub fn error(error: &ScimError) -> Self {
        let body = serde_json::to_value(error.to_response()).ok();
        Self::new(error.status(), body)
    }

    /// Take `ETag` and `Location` from the body's `meta`.
    pub fn with_resource_headers(mut self) -> Self {
        let meta = self.body.as_ref().and_then(|body| body.get("meta"));
        self.etag = meta
            .and_then(|meta| meta.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self.location = meta
            .and_then(|meta| meta.get("location"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// ListResponse envelope (RFC 7644 §3.4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub schemas: Vec<String>,
    pub total_results: usize,
    pub items_per_page: usize,
    pub start_index: usize,
    #[serde(rename = "Resources")]
    pub resources: Vec<Value>,
}

impl ListResponse {
    pub fn new(resources: Vec<Value>, summary: PageSummary) -> Self {
        Self {
            schemas: vec![LIST_RESPONSE_SCHEMA.to_string()],
            total_results: summary.total_results,
            items_per_page: summary.items_per_page,
            start_index: summary.start_index,
            resources,
        }
    }

    /// An unpaged listing, as discovery endpoints return.
    pub fn complete(resources: Vec<Value>) -> Self {
        let count = resources.len();
        Self::new(
            resources,
            PageSummary {
                total_results: count,
                items_per_page: count,
                start_index: 1,
            },
        )
    }
}
