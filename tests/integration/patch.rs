//! PATCH through the dispatcher: operations run against the mapped
//! resource and the result is written back to the backend.

use crate::common::fixtures::{BJENSEN_ID, ENTERPRISE, TOUR_GUIDES_ID};
use crate::common::{base_config, dispatcher, dispatcher_with, expect_status, hr_connector, scim_type};

use scim_adapter::connector::Connector;
use scim_adapter::patch::NoTargetPolicy;
use scim_adapter::{Dispatcher, ScimRequest};
use serde_json::{Value, json};
use std::sync::Arc;

const JSMITH_ID: &str = "a1b2c3d4-0000-4000-8000-000000000002";
const PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

fn patch_body(operations: Value) -> Value {
    json!({ "schemas": [PATCH_OP], "Operations": operations })
}

async fn patch(dispatcher: &Dispatcher, path: &str, operations: Value, status: u16) -> Value {
    expect_status(dispatcher, ScimRequest::patch(path, patch_body(operations)), status).await
}

fn user_path(id: &str) -> String {
    format!("/Users/{}", id)
}

#[tokio::test]
async fn test_replace_sub_attribute() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());

    let patched = patch(
        &dispatcher,
        &user_path(BJENSEN_ID),
        json!([{ "op": "replace", "path": "name.givenName", "value": "Babs" }]),
        200,
    )
    .await;
    assert_eq!(patched["name"], json!({ "givenName": "Babs", "familyName": "Jensen" }));
    assert_eq!(patched["userName"], "BJensen");

    let record = connector.get("User", BJENSEN_ID).await.unwrap();
    assert_eq!(record["first_name"], "Babs");
    assert_eq!(record["badge"], "701984");
}

#[tokio::test]
async fn test_patch_changes_version() {
    let dispatcher = dispatcher();
    let path = user_path(BJENSEN_ID);
    let before = dispatcher.dispatch(ScimRequest::get(path.clone())).await;
    let after = dispatcher
        .dispatch(ScimRequest::patch(
            path,
            patch_body(json!([{ "op": "replace", "path": "title", "value": "Lead Guide" }])),
        ))
        .await;
    assert_eq!(after.status, 200);
    assert_ne!(before.etag, after.etag);
}

#[tokio::test]
async fn test_add_without_path() {
    let dispatcher = dispatcher();
    let patched = patch(
        &dispatcher,
        &user_path(JSMITH_ID),
        json!([{ "op": "add", "value": { "displayName": "Johnny", "title": "Engineer" } }]),
        200,
    )
    .await;
    assert_eq!(patched["displayName"], "Johnny");
    assert_eq!(patched["title"], "Engineer");
}

#[tokio::test]
async fn test_replace_filtered_email() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());
    patch(
        &dispatcher,
        &user_path(JSMITH_ID),
        json!([{
            "op": "replace",
            "path": "emails[type eq \"work\"].value",
            "value": "john.smith@example.com"
        }]),
        200,
    )
    .await;
    let record = connector.get("User", JSMITH_ID).await.unwrap();
    assert_eq!(record["mail"], "john.smith@example.com");
}

#[tokio::test]
async fn test_add_enterprise_attribute() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());
    let patched = patch(
        &dispatcher,
        &user_path(JSMITH_ID),
        json!([{ "op": "add", "path": format!("{}:employeeNumber", ENTERPRISE), "value": "900001" }]),
        200,
    )
    .await;
    assert_eq!(patched[ENTERPRISE]["employeeNumber"], "900001");
    assert!(patched["schemas"].as_array().unwrap().contains(&json!(ENTERPRISE)));

    let record = connector.get("User", JSMITH_ID).await.unwrap();
    assert_eq!(record["badge"], "900001");
}

#[tokio::test]
async fn test_add_group_member_strips_display() {
    let dispatcher = dispatcher();
    let patched = patch(
        &dispatcher,
        &format!("/Groups/{}", TOUR_GUIDES_ID),
        json!([{
            "op": "add",
            "path": "members",
            "value": [{ "value": JSMITH_ID, "display": "Not Trusted" }]
        }]),
        200,
    )
    .await;
    let members = patched["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[1], json!({ "value": JSMITH_ID }));
}

#[tokio::test]
async fn test_remove_group_member() {
    let dispatcher = dispatcher();
    let patched = patch(
        &dispatcher,
        &format!("/Groups/{}", TOUR_GUIDES_ID),
        json!([{ "op": "remove", "path": format!("members[value eq \"{}\"]", BJENSEN_ID) }]),
        200,
    )
    .await;
    assert!(patched.get("members").is_none());
}

#[tokio::test]
async fn test_immutable_member_value_rejected() {
    let dispatcher = dispatcher();
    let path = format!("/Groups/{}", TOUR_GUIDES_ID);
    let body = patch(
        &dispatcher,
        &path,
        json!([{
            "op": "replace",
            "path": format!("members[value eq \"{}\"].value", BJENSEN_ID),
            "value": JSMITH_ID
        }]),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("mutability"));

    let group = expect_status(&dispatcher, ScimRequest::get(path), 200).await;
    assert_eq!(group["members"][0]["value"], BJENSEN_ID);
}

#[tokio::test]
async fn test_read_only_id_rejected() {
    let dispatcher = dispatcher();
    let body = patch(
        &dispatcher,
        &user_path(BJENSEN_ID),
        json!([{ "op": "replace", "path": "id", "value": "other" }]),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("mutability"));
}

#[tokio::test]
async fn test_operations_are_all_or_nothing() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());
    patch(
        &dispatcher,
        &user_path(BJENSEN_ID),
        json!([
            { "op": "replace", "path": "displayName", "value": "Changed" },
            { "op": "replace", "path": "id", "value": "other" }
        ]),
        400,
    )
    .await;
    let record = connector.get("User", BJENSEN_ID).await.unwrap();
    assert_eq!(record["display_name"], "Babs Jensen");
}

#[tokio::test]
async fn test_missing_target() {
    let dispatcher = dispatcher();
    let operations = json!([{ "op": "remove", "path": "title" }]);
    let body = patch(&dispatcher, &user_path(JSMITH_ID), operations.clone(), 400).await;
    assert_eq!(scim_type(&body), Some("noTarget"));

    let lenient = dispatcher_with(
        Arc::new(hr_connector()),
        base_config().with_no_target_policy("User", NoTargetPolicy::Ignore),
    );
    let patched = patch(&lenient, &user_path(JSMITH_ID), operations, 200).await;
    assert_eq!(patched["userName"], "jsmith");
}

#[tokio::test]
async fn test_removing_required_attribute_rejected() {
    let dispatcher = dispatcher();
    let body = patch(
        &dispatcher,
        &user_path(BJENSEN_ID),
        json!([{ "op": "remove", "path": "userName" }]),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidValue"));
}

#[tokio::test]
async fn test_malformed_patch_requests() {
    let dispatcher = dispatcher();
    let path = user_path(BJENSEN_ID);

    let body = expect_status(
        &dispatcher,
        ScimRequest::patch(path.clone(), json!({ "Operations": [] })),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidSyntax"));

    let body = patch(
        &dispatcher,
        &path,
        json!([{ "op": "replace", "path": "shoeSize", "value": 42 }]),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidPath"));

    let body = patch(&dispatcher, &path, json!([{ "op": "merge", "path": "title", "value": "x" }]), 400).await;
    assert_eq!(scim_type(&body), Some("invalidSyntax"));
}

#[tokio::test]
async fn test_patch_missing_resource() {
    let dispatcher = dispatcher();
    patch(
        &dispatcher,
        &user_path("nobody"),
        json!([{ "op": "replace", "path": "title", "value": "x" }]),
        404,
    )
    .await;
}
