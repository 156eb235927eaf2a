//! Routing failures, backend failures and authorization, each surfaced as
//! a SCIM error response.

use crate::common::fixtures::{BJENSEN_ID, group_table, new_user_body, user_table};
use crate::common::{HR, base_config, dispatcher, dispatcher_with, expect_status, hr_connector};

use async_trait::async_trait;
use scim_adapter::{
    AdapterConfig, AuthorizationContext, Authorizer, DispatcherBuilder, InMemoryConnector, MappingTable,
    Operation, ScimRequest,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

#[tokio::test]
async fn test_unknown_endpoints() {
    let dispatcher = dispatcher();
    for path in ["/Devices", "/Users/a/b", "/Users//x", "//Users", "/", "/hr/Devices/1"] {
        let body = expect_status(&dispatcher, ScimRequest::get(path), 404).await;
        assert_eq!(body["schemas"], json!([ERROR_SCHEMA]), "{path}");
    }
}

#[tokio::test]
async fn test_unsupported_methods() {
    let dispatcher = dispatcher();
    let requests = [
        ScimRequest::delete("/Users"),
        ScimRequest::new("HEAD", "/Users"),
        ScimRequest::get("/Users/.search"),
        ScimRequest::post(format!("/Users/{}", BJENSEN_ID), json!({})),
    ];
    for request in requests {
        let body = expect_status(&dispatcher, request, 405).await;
        assert_eq!(body["status"], "405");
    }
}

#[tokio::test]
async fn test_method_names_are_case_insensitive() {
    let dispatcher = dispatcher();
    expect_status(&dispatcher, ScimRequest::new("get", "/Users"), 200).await;
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let connector = Arc::new(hr_connector().with_latency(Duration::from_millis(500)));
    let dispatcher = dispatcher_with(
        connector,
        base_config().with_request_timeout(Duration::from_millis(20)),
    );
    let body = expect_status(&dispatcher, ScimRequest::get(format!("/Users/{}", BJENSEN_ID)), 504).await;
    assert_eq!(body["status"], "504");
}

#[tokio::test]
async fn test_backend_outage() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());

    connector.set_available(false);
    expect_status(&dispatcher, ScimRequest::get("/Users"), 503).await;
    expect_status(&dispatcher, ScimRequest::post("/Users", new_user_body("kpark")), 503).await;

    connector.set_available(true);
    expect_status(&dispatcher, ScimRequest::get("/Users"), 200).await;
}

#[tokio::test]
async fn test_read_only_backend() {
    let connector = Arc::new(hr_connector().read_only());
    let dispatcher = dispatcher_with(connector, base_config());

    expect_status(&dispatcher, ScimRequest::post("/Users", new_user_body("kpark")), 501).await;
    expect_status(&dispatcher, ScimRequest::delete(format!("/Users/{}", BJENSEN_ID)), 501).await;
    expect_status(&dispatcher, ScimRequest::get(format!("/Users/{}", BJENSEN_ID)), 200).await;
}

#[tokio::test]
async fn test_record_missing_required_field() {
    let connector = Arc::new(
        InMemoryConnector::new(HR).with_records("User", vec![json!({ "id": "broken", "first_name": "Ada" })]),
    );
    let dispatcher = dispatcher_with(connector, base_config());

    let body = expect_status(&dispatcher, ScimRequest::get("/Users/broken"), 500).await;
    assert_eq!(body["status"], "500");
    expect_status(&dispatcher, ScimRequest::get("/Users"), 500).await;
}

#[tokio::test]
async fn test_ambiguous_system_needs_prefix() {
    let crm = Arc::new(InMemoryConnector::new("crm"));
    let dispatcher = DispatcherBuilder::new()
        .with_config(AdapterConfig::new().with_base_url("https://idp.example.com/scim/v2"))
        .with_connector(Arc::new(hr_connector()))
        .with_connector(crm)
        .with_mapping_table(user_table())
        .with_mapping_table(group_table())
        .with_mapping_table(MappingTable::new("User", "crm").map("id", "id").map("userName", "login"))
        .build()
        .unwrap();

    expect_status(&dispatcher, ScimRequest::get("/Users"), 404).await;

    let crm_users = expect_status(&dispatcher, ScimRequest::get("/crm/Users"), 200).await;
    assert_eq!(crm_users["totalResults"], 0);
    let hr_users = expect_status(&dispatcher, ScimRequest::get("/hr/Users"), 200).await;
    assert_eq!(hr_users["totalResults"], 5);

    // Groups are only mapped for hr
    expect_status(&dispatcher, ScimRequest::get("/Groups"), 200).await;
}

struct ReadOnlyClients;

#[async_trait]
impl Authorizer for ReadOnlyClients {
    async fn authorize(&self, context: &AuthorizationContext<'_>) -> Result<(), String> {
        match context.operation {
            Operation::List | Operation::Search | Operation::Get | Operation::Discovery => Ok(()),
            other => Err(format!("{} is not permitted", other)),
        }
    }
}

#[tokio::test]
async fn test_authorizer_rejects_request() {
    let connector = Arc::new(hr_connector());
    let dispatcher = DispatcherBuilder::new()
        .with_config(base_config())
        .with_connector(connector.clone())
        .with_mapping_table(user_table())
        .with_mapping_table(group_table())
        .with_authorizer(Arc::new(ReadOnlyClients))
        .build()
        .unwrap();

    expect_status(&dispatcher, ScimRequest::get("/Users"), 200).await;
    let body = expect_status(&dispatcher, ScimRequest::delete(format!("/Users/{}", BJENSEN_ID)), 403).await;
    assert!(body["detail"].as_str().unwrap().contains("not permitted"));
    assert_eq!(connector.len("User").await, 5);
}
