//! Single-resource operations through the dispatcher.

use crate::common::fixtures::{
    BJENSEN_ID, ENTERPRISE, TOUR_GUIDES_ID, USER_SCHEMA, new_user_body,
};
use crate::common::{base_config, dispatcher, dispatcher_with, expect_status, hr_connector, scim_type};

use scim_adapter::ScimRequest;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_get_user_maps_backend_record() {
    let dispatcher = dispatcher();
    let response = dispatcher
        .dispatch(ScimRequest::get(format!("/Users/{}", BJENSEN_ID)))
        .await;
    assert_eq!(response.status, 200);
    let body = response.body.clone().unwrap();

    assert_eq!(body["id"], BJENSEN_ID);
    assert_eq!(body["userName"], "BJensen");
    assert_eq!(body["name"], json!({ "givenName": "Barbara", "familyName": "Jensen" }));
    assert_eq!(body["emails"][0]["value"], "bjensen@example.com");
    assert_eq!(body["emails"][0]["type"], "work");
    assert_eq!(body["active"], true);
    assert_eq!(body[ENTERPRISE]["employeeNumber"], "701984");
    assert_eq!(body["schemas"], json!([USER_SCHEMA, ENTERPRISE]));

    assert_eq!(body["meta"]["resourceType"], "User");
    assert_eq!(
        body["meta"]["location"],
        format!("https://idp.example.com/scim/v2/Users/{}", BJENSEN_ID)
    );
    let version = body["meta"]["version"].as_str().unwrap();
    assert!(version.starts_with("W/\""));
    assert_eq!(response.etag.as_deref(), Some(version));
}

#[tokio::test]
async fn test_version_is_stable_for_unchanged_record() {
    let dispatcher = dispatcher();
    let path = format!("/Users/{}", BJENSEN_ID);
    let first = dispatcher.dispatch(ScimRequest::get(path.clone())).await;
    let second = dispatcher.dispatch(ScimRequest::get(path)).await;
    assert_eq!(first.etag, second.etag);
}

#[tokio::test]
async fn test_get_missing_user() {
    let dispatcher = dispatcher();
    let body = expect_status(&dispatcher, ScimRequest::get("/Users/nobody"), 404).await;
    assert_eq!(body["status"], "404");
    assert_eq!(body["schemas"][0], "urn:ietf:params:scim:api:messages:2.0:Error");
}

#[tokio::test]
async fn test_create_user() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());

    let response = dispatcher
        .dispatch(ScimRequest::post("/Users", new_user_body("kpark")))
        .await;
    assert_eq!(response.status, 201);
    let body = response.body.clone().unwrap();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["userName"], "kpark");
    assert_eq!(body["name"]["familyName"], "Park");
    assert_eq!(
        response.location.as_deref(),
        Some(format!("https://idp.example.com/scim/v2/Users/{}", id).as_str())
    );
    assert_eq!(connector.len("User").await, 6);

    let fetched = expect_status(&dispatcher, ScimRequest::get(format!("/Users/{}", id)), 200).await;
    assert_eq!(fetched["emails"][0]["value"], "kpark@example.com");
}

#[tokio::test]
async fn test_create_ignores_server_owned_attributes() {
    let dispatcher = dispatcher();
    let mut body = new_user_body("kpark");
    body["id"] = json!("chosen-by-client");
    body["groups"] = json!([{ "value": TOUR_GUIDES_ID }]);

    let created = expect_status(&dispatcher, ScimRequest::post("/Users", body), 201).await;
    assert_ne!(created["id"], "chosen-by-client");
    assert!(created.get("groups").is_none());
}

#[tokio::test]
async fn test_create_duplicate_user_name() {
    let dispatcher = dispatcher();
    let body = expect_status(
        &dispatcher,
        ScimRequest::post("/Users", new_user_body("bjensen")),
        409,
    )
    .await;
    assert_eq!(scim_type(&body), Some("uniqueness"));
}

#[tokio::test]
async fn test_create_missing_required_attribute() {
    let dispatcher = dispatcher();
    let body = expect_status(
        &dispatcher,
        ScimRequest::post("/Users", json!({ "schemas": [USER_SCHEMA], "displayName": "Nobody" })),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidValue"));
}

#[tokio::test]
async fn test_create_group_strips_read_only_member_display() {
    let dispatcher = dispatcher();
    let created = expect_status(
        &dispatcher,
        ScimRequest::post(
            "/Groups",
            json!({
                "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
                "displayName": "Night Shift",
                "members": [{ "value": BJENSEN_ID, "display": "Someone Else" }]
            }),
        ),
        201,
    )
    .await;
    assert_eq!(created["members"], json!([{ "value": BJENSEN_ID }]));
}

#[tokio::test]
async fn test_replace_user() {
    let dispatcher = dispatcher();
    let path = format!("/Users/{}", BJENSEN_ID);
    let replaced = expect_status(
        &dispatcher,
        ScimRequest::put(
            path.clone(),
            json!({
                "schemas": [USER_SCHEMA],
                "id": "ignored",
                "userName": "bjensen",
                "name": { "givenName": "Barbara", "familyName": "Jensen-Smith" },
                "active": false
            }),
        ),
        200,
    )
    .await;

    assert_eq!(replaced["id"], BJENSEN_ID);
    assert_eq!(replaced["name"]["familyName"], "Jensen-Smith");
    assert_eq!(replaced["active"], false);
    // PUT replaces: attributes left out are gone
    assert!(replaced.get("displayName").is_none());
    assert!(replaced.get(ENTERPRISE).is_none());

    let fetched = expect_status(&dispatcher, ScimRequest::get(path), 200).await;
    assert_eq!(fetched["userName"], "bjensen");
}

#[tokio::test]
async fn test_replace_missing_user() {
    let dispatcher = dispatcher();
    expect_status(
        &dispatcher,
        ScimRequest::put("/Users/nobody", new_user_body("nobody")),
        404,
    )
    .await;
}

#[tokio::test]
async fn test_replace_requires_body() {
    let dispatcher = dispatcher();
    let body = expect_status(
        &dispatcher,
        ScimRequest::new("PUT", format!("/Users/{}", BJENSEN_ID)),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidSyntax"));
}

#[tokio::test]
async fn test_delete_user() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());
    let path = format!("/Users/{}", BJENSEN_ID);

    let response = dispatcher.dispatch(ScimRequest::delete(path.clone())).await;
    assert_eq!(response.status, 204);
    assert!(response.body.is_none());
    assert_eq!(connector.len("User").await, 4);

    expect_status(&dispatcher, ScimRequest::get(path.clone()), 404).await;
    expect_status(&dispatcher, ScimRequest::delete(path), 404).await;
}

#[tokio::test]
async fn test_system_prefix_selects_connector() {
    let dispatcher = dispatcher();
    let body = expect_status(
        &dispatcher,
        ScimRequest::get(format!("/hr/Users/{}", BJENSEN_ID)),
        200,
    )
    .await;
    assert_eq!(body["userName"], "BJensen");

    expect_status(
        &dispatcher,
        ScimRequest::get(format!("/crm/Users/{}", BJENSEN_ID)),
        404,
    )
    .await;
}

#[tokio::test]
async fn test_password_is_never_returned() {
    let connector = Arc::new(hr_connector());
    let dispatcher = scim_adapter::DispatcherBuilder::new()
        .with_config(base_config())
        .with_connector(connector)
        .with_mapping_table(crate::common::fixtures::user_table().map("password", "secret"))
        .with_mapping_table(crate::common::fixtures::group_table())
        .build()
        .unwrap();

    let mut body = new_user_body("kpark");
    body["password"] = json!("t1meMa$heen");
    let created = expect_status(&dispatcher, ScimRequest::post("/Users", body), 201).await;
    assert!(created.get("password").is_none());
}
