//! Property tests for the invariants the adapter relies on.

use crate::common::fixtures::user_table;
use crate::common::{base_config, dispatcher_with, hr_connector};

use proptest::prelude::*;
use scim_adapter::dispatcher::Pagination;
use scim_adapter::{
    InMemoryConnector, PatchApplier, ResourceMapper, ScimRequest, SchemaRegistry, TransformRegistry,
    parse_filter,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const ATTRIBUTES: &[&str] = &[
    "userName",
    "displayName",
    "title",
    "name.givenName",
    "emails.value",
    "meta.lastModified",
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:employeeNumber",
];
const OPERATORS: &[&str] = &["eq", "ne", "co", "sw", "ew", "gt", "ge", "lt", "le"];

fn literal() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 @.]{0,10}".prop_map(|s| format!("\"{}\"", s)),
        any::<bool>().prop_map(|b| b.to_string()),
        (-1000i64..1000).prop_map(|n| n.to_string()),
        Just("null".to_string()),
    ]
}

fn comparison() -> impl Strategy<Value = String> {
    prop_oneof![
        (
            prop::sample::select(ATTRIBUTES),
            prop::sample::select(OPERATORS),
            literal()
        )
            .prop_map(|(attribute, op, value)| format!("{} {} {}", attribute, op, value)),
        prop::sample::select(ATTRIBUTES).prop_map(|attribute| format!("{} pr", attribute)),
        ("[a-z]{1,6}", literal())
            .prop_map(|(kind, value)| format!("emails[type eq \"{}\" and value co {}]", kind, value)),
    ]
}

fn filter() -> impl Strategy<Value = String> {
    comparison().prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} and {}", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} or {}", a, b)),
            inner.clone().prop_map(|a| format!("not ({})", a)),
            inner.prop_map(|a| format!("({})", a)),
        ]
    })
}

fn optional_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z0-9 @.'-]{1,12}")
}

prop_compose! {
    fn backend_user()(
        login in "[a-z][a-z0-9.]{0,11}",
        first_name in optional_text(),
        last_name in optional_text(),
        display_name in optional_text(),
        title in optional_text(),
        enabled in proptest::option::of(any::<bool>()),
        mail in optional_text(),
        badge in optional_text(),
    ) -> Value {
        let mut record = Map::new();
        record.insert("id".to_string(), json!(format!("id-{}", login)));
        record.insert("login".to_string(), json!(login));
        let optional = [
            ("first_name", first_name.map(Value::String)),
            ("last_name", last_name.map(Value::String)),
            ("display_name", display_name.map(Value::String)),
            ("title", title.map(Value::String)),
            ("enabled", enabled.map(Value::Bool)),
            ("mail", mail.map(Value::String)),
            ("badge", badge.map(Value::String)),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                record.insert(field.to_string(), value);
            }
        }
        Value::Object(record)
    }
}

proptest! {
    #[test]
    fn prop_filter_canonical_form_is_stable(text in filter()) {
        let parsed = parse_filter(&text).unwrap();
        let canonical = parsed.to_string();
        let reparsed = parse_filter(&canonical).unwrap();
        prop_assert_eq!(&reparsed, &parsed);
        prop_assert_eq!(reparsed.to_string(), canonical);
    }

    #[test]
    fn prop_slice_respects_page_bounds(
        start_index in -5i64..60,
        count in -5i64..60,
        total in 0usize..50,
        max_results in 0usize..80,
    ) {
        let pagination = Pagination::new(Some(start_index), Some(count), max_results);
        let (page, summary) = pagination.slice((0..total).collect::<Vec<_>>());

        prop_assert_eq!(page.len(), summary.items_per_page);
        prop_assert!(summary.start_index >= 1);
        prop_assert!(summary.items_per_page <= count.max(0) as usize);
        prop_assert!(summary.items_per_page <= max_results);
        prop_assert!(summary.start_index + summary.items_per_page - 1 <= summary.total_results);
        prop_assert_eq!(summary.total_results, total);
        if let Some(first) = page.first() {
            prop_assert_eq!(*first, summary.start_index - 1);
        }
    }

    #[test]
    fn prop_backend_page_respects_page_bounds(
        start_index in 1i64..60,
        count in 0i64..60,
        total in 0usize..50,
        overshoot in 0usize..5,
    ) {
        let pagination = Pagination::new(Some(start_index), Some(count), 200);
        // A backend may hand back more records than asked for
        let records: Vec<usize> = (0..total)
            .skip(pagination.offset())
            .take(pagination.count + overshoot)
            .collect();
        let (page, summary) = pagination.backend_page(records, Some(total));

        prop_assert!(page.len() <= count as usize);
        prop_assert!(summary.start_index + summary.items_per_page - 1 <= summary.total_results);
    }

    #[test]
    fn prop_mapping_round_trips(record in backend_user()) {
        let registry = SchemaRegistry::new().unwrap();
        let mapper = ResourceMapper::new(user_table(), &registry, &TransformRegistry::new()).unwrap();

        let resource = mapper.to_scim(&record).unwrap();
        prop_assert_eq!(resource.id(), record["id"].as_str());
        let back = mapper.to_backend(&resource).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn prop_empty_patch_is_identity(record in backend_user()) {
        let registry = SchemaRegistry::new().unwrap();
        let mapper = ResourceMapper::new(user_table(), &registry, &TransformRegistry::new()).unwrap();
        let resource = mapper.to_scim(&record).unwrap().to_json();

        let patched = PatchApplier::new(&registry, "User").apply(&resource, &[]).unwrap();
        prop_assert_eq!(patched, resource);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_list_responses_respect_page_bounds(
        start_index in -2i64..12,
        count in -2i64..12,
        native in any::<bool>(),
    ) {
        let mut connector = hr_connector();
        if native {
            connector = connector.with_capabilities(scim_adapter::ConnectorCapabilities {
                filtering: true,
                pagination: true,
            });
        }
        let connector: Arc<InMemoryConnector> = Arc::new(connector);
        let dispatcher = dispatcher_with(connector, base_config());

        let request = ScimRequest::get("/Users")
            .with_query("startIndex", start_index.to_string())
            .with_query("count", count.to_string());
        let response = tokio_test::block_on(dispatcher.dispatch(request));
        prop_assert_eq!(response.status, 200);

        let body = response.body.unwrap();
        let total = body["totalResults"].as_u64().unwrap();
        let items = body["itemsPerPage"].as_u64().unwrap();
        let start = body["startIndex"].as_u64().unwrap();
        prop_assert_eq!(body["Resources"].as_array().unwrap().len() as u64, items);
        prop_assert_eq!(total, 5);
        prop_assert!(start >= 1);
        prop_assert!(items <= count.max(0) as u64);
        prop_assert!(start + items - 1 <= total);
    }
}
