//! Many requests against one shared dispatcher.

use crate::common::fixtures::{BJENSEN_ID, new_user_body};
use crate::common::{base_config, dispatcher_with, hr_connector};

use futures::future::join_all;
use scim_adapter::ScimRequest;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_creates() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());

    let requests = (0..20).map(|i| {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .dispatch(ScimRequest::post("/Users", new_user_body(&format!("user{}", i))))
                .await
        }
    });
    let responses = join_all(requests).await;

    let ids: HashSet<String> = responses
        .iter()
        .map(|response| {
            assert_eq!(response.status, 201);
            response.body.as_ref().unwrap()["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(connector.len("User").await, 25);
}

#[tokio::test]
async fn test_concurrent_duplicate_creates_admit_one() {
    let connector = Arc::new(hr_connector());
    let dispatcher = dispatcher_with(connector.clone(), base_config());

    let requests = (0..10).map(|_| dispatcher.dispatch(ScimRequest::post("/Users", new_user_body("kpark"))));
    let statuses: Vec<u16> = join_all(requests)
        .await
        .into_iter()
        .map(|response| response.status)
        .collect();

    assert_eq!(statuses.iter().filter(|status| **status == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|status| **status == 409).count(), 9);
    assert_eq!(connector.len("User").await, 6);
}

#[tokio::test]
async fn test_reads_during_writes() {
    let dispatcher = dispatcher_with(Arc::new(hr_connector()), base_config());
    let path = format!("/Users/{}", BJENSEN_ID);

    let writes = (0..10).map(|i| {
        dispatcher.dispatch(ScimRequest::patch(
            path.clone(),
            json!({
                "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
                "Operations": [{ "op": "replace", "path": "title", "value": format!("Guide {}", i) }]
            }),
        ))
    });
    let reads = (0..10).map(|_| dispatcher.dispatch(ScimRequest::get(path.clone())));

    let (writes, reads) = tokio::join!(join_all(writes), join_all(reads));
    assert!(writes.iter().all(|response| response.status == 200));
    for response in reads {
        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["userName"], "BJensen");
    }

    let spawned = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch(ScimRequest::get("/Users")).await }
    });
    assert_eq!(spawned.await.unwrap().status, 200);
}
