//! Discovery endpoints describe the adapter and never touch a connector.

use crate::common::fixtures::{ENTERPRISE, GROUP_SCHEMA, USER_SCHEMA};
use crate::common::{base_config, dispatcher, dispatcher_with, expect_status, hr_connector};

use scim_adapter::ScimRequest;
use serde_json::{Value, json};
use std::sync::Arc;

fn ids(body: &Value, field: &str) -> Vec<String> {
    body["Resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|resource| resource[field].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_service_provider_config() {
    let mut config = base_config().with_max_results(50);
    config.documentation_uri = Some("https://idp.example.com/help/scim".to_string());
    let dispatcher = dispatcher_with(Arc::new(hr_connector()), config);

    let body = expect_status(&dispatcher, ScimRequest::get("/ServiceProviderConfig"), 200).await;
    assert_eq!(
        body["schemas"],
        json!(["urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"])
    );
    assert_eq!(body["patch"]["supported"], true);
    assert_eq!(body["bulk"]["supported"], false);
    assert_eq!(body["filter"], json!({ "supported": true, "maxResults": 50 }));
    assert_eq!(body["sort"]["supported"], false);
    assert_eq!(body["etag"]["supported"], true);
    assert_eq!(body["documentationUri"], "https://idp.example.com/help/scim");
    assert_eq!(
        body["meta"]["location"],
        "https://idp.example.com/scim/v2/ServiceProviderConfig"
    );
}

#[tokio::test]
async fn test_list_schemas() {
    let dispatcher = dispatcher();
    let body = expect_status(&dispatcher, ScimRequest::get("/Schemas"), 200).await;
    assert_eq!(body["totalResults"], 3);

    let mut expected = vec![GROUP_SCHEMA.to_string(), USER_SCHEMA.to_string(), ENTERPRISE.to_string()];
    expected.sort();
    assert_eq!(ids(&body, "id"), expected);
}

#[tokio::test]
async fn test_get_schema() {
    let dispatcher = dispatcher();
    let body = expect_status(&dispatcher, ScimRequest::get(format!("/Schemas/{}", USER_SCHEMA)), 200).await;
    assert_eq!(body["id"], USER_SCHEMA);
    assert_eq!(body["name"], "User");
    assert_eq!(body["meta"]["resourceType"], "Schema");
    assert_eq!(
        body["meta"]["location"],
        format!("https://idp.example.com/scim/v2/Schemas/{}", USER_SCHEMA)
    );
    let attributes = body["attributes"].as_array().unwrap();
    assert!(attributes.iter().any(|attribute| attribute["name"] == "userName"));

    expect_status(&dispatcher, ScimRequest::get("/Schemas/urn:example:unknown"), 404).await;
}

#[tokio::test]
async fn test_resource_types() {
    let dispatcher = dispatcher();
    let body = expect_status(&dispatcher, ScimRequest::get("/ResourceTypes"), 200).await;
    assert_eq!(body["totalResults"], 2);
    let mut names = ids(&body, "name");
    names.sort();
    assert_eq!(names, vec!["Group", "User"]);

    let user = expect_status(&dispatcher, ScimRequest::get("/ResourceTypes/User"), 200).await;
    assert_eq!(user["endpoint"], "/Users");
    assert_eq!(user["schema"], USER_SCHEMA);
    assert_eq!(user["schemaExtensions"][0]["schema"], ENTERPRISE);
    assert_eq!(user["schemaExtensions"][0]["required"], false);
    assert_eq!(
        user["meta"]["location"],
        "https://idp.example.com/scim/v2/ResourceTypes/User"
    );

    expect_status(&dispatcher, ScimRequest::get("/ResourceTypes/Device"), 404).await;
}

#[tokio::test]
async fn test_discovery_is_read_only() {
    let dispatcher = dispatcher();
    for request in [
        ScimRequest::post("/Schemas", json!({})),
        ScimRequest::delete("/ResourceTypes/User"),
        ScimRequest::put("/ServiceProviderConfig", json!({})),
    ] {
        expect_status(&dispatcher, request, 405).await;
    }
}

#[tokio::test]
async fn test_discovery_ignores_backend_outage() {
    let connector = Arc::new(hr_connector());
    connector.set_available(false);
    let dispatcher = dispatcher_with(connector, base_config());
    expect_status(&dispatcher, ScimRequest::get("/ResourceTypes"), 200).await;
}
