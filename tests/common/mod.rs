//! Common test utilities for the adapter test suite.
//!
//! Builds dispatchers over [`InMemoryConnector`] backends with the mapping
//! tables from [`fixtures`].

#![allow(dead_code)]

pub mod fixtures;

use scim_adapter::{
    AdapterConfig, Dispatcher, DispatcherBuilder, InMemoryConnector, ScimRequest, ScimResponse,
};
use serde_json::Value;
use std::sync::Arc;

pub const HR: &str = "hr";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The standard HR connector seeded with the fixture users and groups.
pub fn hr_connector() -> InMemoryConnector {
    InMemoryConnector::new(HR)
        .with_unique_field("User", "login")
        .with_records("User", fixtures::user_records())
        .with_records("Group", vec![fixtures::tour_guides_record()])
}

/// Callers keep a clone of `connector` to inspect the backend or take it
/// offline.
pub fn dispatcher_with(connector: Arc<InMemoryConnector>, config: AdapterConfig) -> Dispatcher {
    init_logging();
    DispatcherBuilder::new()
        .with_config(config)
        .with_connector(connector)
        .with_mapping_table(fixtures::user_table())
        .with_mapping_table(fixtures::group_table())
        .build()
        .expect("fixture dispatcher builds")
}

pub fn dispatcher() -> Dispatcher {
    dispatcher_with(Arc::new(hr_connector()), base_config())
}

pub fn base_config() -> AdapterConfig {
    AdapterConfig::new()
        .with_base_url("https://idp.example.com/scim/v2")
        .bind("User", HR)
        .bind("Group", HR)
}

/// Dispatch and return the response body, asserting the status.
pub async fn expect_status(dispatcher: &Dispatcher, request: ScimRequest, status: u16) -> Value {
    let response: ScimResponse = dispatcher.dispatch(request).await;
    assert_eq!(
        response.status, status,
        "unexpected status, body: {:?}",
        response.body
    );
    response.body.unwrap_or(Value::Null)
}

/// `scimType` of an error body.
pub fn scim_type(body: &Value) -> Option<&str> {
    body.get("scimType").and_then(Value::as_str)
}
