//! List and search: filtering, paging and projection, with and without
//! backend support.

use crate::common::fixtures::{BJENSEN_ID, ENTERPRISE};
use crate::common::{base_config, dispatcher, dispatcher_with, expect_status, hr_connector, scim_type};

use scim_adapter::dispatcher::LIST_RESPONSE_SCHEMA;
use scim_adapter::{ConnectorCapabilities, Dispatcher, ScimRequest};
use serde_json::{Value, json};
use std::sync::Arc;

fn native_dispatcher() -> Dispatcher {
    let connector = hr_connector().with_capabilities(ConnectorCapabilities {
        filtering: true,
        pagination: true,
    });
    dispatcher_with(Arc::new(connector), base_config())
}

fn user_names(body: &Value) -> Vec<&str> {
    body["Resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|resource| resource["userName"].as_str().unwrap())
        .collect()
}

async fn list(dispatcher: &Dispatcher, query: &[(&str, &str)]) -> Value {
    let request = query
        .iter()
        .fold(ScimRequest::get("/Users"), |request, (name, value)| {
            request.with_query(*name, *value)
        });
    expect_status(dispatcher, request, 200).await
}

#[tokio::test]
async fn test_list_all_users() {
    let body = list(&dispatcher(), &[]).await;
    assert_eq!(body["schemas"], json!([LIST_RESPONSE_SCHEMA]));
    assert_eq!(body["totalResults"], 5);
    assert_eq!(body["itemsPerPage"], 5);
    assert_eq!(body["startIndex"], 1);
}

#[tokio::test]
async fn test_first_page_of_two() {
    for dispatcher in [dispatcher(), native_dispatcher()] {
        let body = list(&dispatcher, &[("startIndex", "1"), ("count", "2")]).await;
        assert_eq!(body["totalResults"], 5);
        assert_eq!(body["itemsPerPage"], 2);
        assert_eq!(body["startIndex"], 1);
        assert_eq!(user_names(&body), vec!["BJensen", "jsmith"]);
    }
}

#[tokio::test]
async fn test_later_page() {
    for dispatcher in [dispatcher(), native_dispatcher()] {
        let body = list(&dispatcher, &[("startIndex", "2"), ("count", "2")]).await;
        assert_eq!(body["totalResults"], 5);
        assert_eq!(body["startIndex"], 2);
        assert_eq!(user_names(&body), vec!["jsmith", "mpepper"]);
    }
}

#[tokio::test]
async fn test_out_of_range_paging_parameters() {
    let dispatcher = dispatcher();
    let body = list(&dispatcher, &[("startIndex", "0"), ("count", "-1")]).await;
    assert_eq!(body["startIndex"], 1);
    assert_eq!(body["itemsPerPage"], 0);
    assert_eq!(body["totalResults"], 5);

    let body = list(&dispatcher, &[("startIndex", "10")]).await;
    assert_eq!(body["itemsPerPage"], 0);
    assert_eq!(body["totalResults"], 5);
    assert_eq!(body["startIndex"], 6);

    let body = expect_status(
        &dispatcher,
        ScimRequest::get("/Users").with_query("count", "lots"),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidValue"));
}

#[tokio::test]
async fn test_count_capped_by_max_results() {
    let dispatcher = dispatcher_with(Arc::new(hr_connector()), base_config().with_max_results(3));
    let body = list(&dispatcher, &[("count", "10")]).await;
    assert_eq!(body["itemsPerPage"], 3);
    assert_eq!(body["totalResults"], 5);

    let body = list(&dispatcher, &[]).await;
    assert_eq!(body["itemsPerPage"], 3);
}

#[tokio::test]
async fn test_user_name_filter_is_case_insensitive() {
    for dispatcher in [dispatcher(), native_dispatcher()] {
        let body = list(&dispatcher, &[("filter", "userName eq \"bjensen\"")]).await;
        assert_eq!(body["totalResults"], 1);
        assert_eq!(user_names(&body), vec!["BJensen"]);
    }
}

#[tokio::test]
async fn test_id_filter_is_case_exact() {
    for dispatcher in [dispatcher(), native_dispatcher()] {
        let exact = format!("id eq \"{}\"", BJENSEN_ID);
        let body = list(&dispatcher, &[("filter", exact.as_str())]).await;
        assert_eq!(user_names(&body), vec!["BJensen"]);

        let shouted = format!("id eq \"{}\"", BJENSEN_ID.to_uppercase());
        let body = list(&dispatcher, &[("filter", shouted.as_str())]).await;
        assert_eq!(body["totalResults"], 0);
    }
}

#[tokio::test]
async fn test_filters() {
    let dispatcher = dispatcher();
    let cases = [
        ("active eq false", vec!["tlee"]),
        ("name.familyName sw \"J\"", vec!["BJensen"]),
        ("title pr", vec!["BJensen"]),
        ("not (active eq true)", vec!["tlee"]),
        (
            "userName eq \"jsmith\" or userName eq \"akumar\"",
            vec!["jsmith", "akumar"],
        ),
        ("emails[type eq \"work\" and value sw \"mpep\"]", vec!["mpepper"]),
    ];
    for (filter, expected) in cases {
        let body = list(&dispatcher, &[("filter", filter)]).await;
        assert_eq!(user_names(&body), expected, "{filter}");
    }

    let filter = format!("{}:employeeNumber eq \"701984\"", ENTERPRISE);
    let body = list(&dispatcher, &[("filter", filter.as_str())]).await;
    assert_eq!(user_names(&body), vec!["BJensen"]);
}

#[tokio::test]
async fn test_untranslatable_filter_falls_back_to_memory() {
    let dispatcher = native_dispatcher();
    let body = list(
        &dispatcher,
        &[
            ("filter", "emails[type eq \"work\" and value ew \"example.com\"]"),
            ("count", "2"),
        ],
    )
    .await;
    assert_eq!(body["totalResults"], 5);
    assert_eq!(body["itemsPerPage"], 2);
}

#[tokio::test]
async fn test_invalid_filters() {
    let dispatcher = dispatcher();
    for filter in ["userName eq", "shoeSize eq 42", "userName xx \"a\"", "(active eq true"] {
        let body = expect_status(
            &dispatcher,
            ScimRequest::get("/Users").with_query("filter", filter),
            400,
        )
        .await;
        assert_eq!(scim_type(&body), Some("invalidFilter"), "{filter}");
    }
}

#[tokio::test]
async fn test_group_member_filter() {
    let dispatcher = dispatcher();
    let filter = format!("members[value eq \"{}\"]", BJENSEN_ID);
    let body = expect_status(
        &dispatcher,
        ScimRequest::get("/Groups").with_query("filter", filter),
        200,
    )
    .await;
    assert_eq!(body["totalResults"], 1);
    assert_eq!(body["Resources"][0]["displayName"], "Tour Guides");
}

#[tokio::test]
async fn test_attribute_projection() {
    let dispatcher = dispatcher();
    let body = list(&dispatcher, &[("attributes", "userName"), ("count", "1")]).await;
    let resource = body["Resources"][0].as_object().unwrap();
    let mut keys: Vec<&str> = resource.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["id", "meta", "schemas", "userName"]);

    let body = list(&dispatcher, &[("excludedAttributes", "emails,name"), ("count", "1")]).await;
    let resource = &body["Resources"][0];
    assert!(resource.get("emails").is_none());
    assert!(resource.get("name").is_none());
    assert_eq!(resource["userName"], "BJensen");
}

#[tokio::test]
async fn test_search_endpoint() {
    for dispatcher in [dispatcher(), native_dispatcher()] {
        let body = expect_status(
            &dispatcher,
            ScimRequest::post(
                "/Users/.search",
                json!({
                    "schemas": ["urn:ietf:params:scim:api:messages:2.0:SearchRequest"],
                    "filter": "userName sw \"j\"",
                    "attributes": ["userName", "name.givenName"],
                    "startIndex": 1,
                    "count": 10
                }),
            ),
            200,
        )
        .await;
        assert_eq!(body["totalResults"], 1);
        assert_eq!(body["Resources"][0]["name"], json!({ "givenName": "John" }));
        assert!(body["Resources"][0].get("emails").is_none());
    }
}

#[tokio::test]
async fn test_search_requires_search_request_schema() {
    let dispatcher = dispatcher();
    let body = expect_status(
        &dispatcher,
        ScimRequest::post("/Users/.search", json!({ "filter": "userName pr" })),
        400,
    )
    .await;
    assert_eq!(scim_type(&body), Some("invalidSyntax"));
}
