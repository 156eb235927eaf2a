//! Backend records and mapping tables shared by the integration tests.
//!
//! The HR backend stores users as flat records (`login`, `first_name`,
//! `mail`, ...) and groups with a `members` list already in SCIM shape.

use scim_adapter::MappingTable;
use serde_json::{Value, json};

pub const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";
pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const BJENSEN_ID: &str = "2819c223-7f76-453a-919d-413861904646";
pub const TOUR_GUIDES_ID: &str = "e9e30dba-f08f-4109-8486-d5c6a331660a";

pub fn user_table() -> MappingTable {
    MappingTable::new("User", "hr")
        .map("id", "id")
        .map("userName", "login")
        .map("name.givenName", "first_name")
        .map("name.familyName", "last_name")
        .map("displayName", "display_name")
        .map("title", "title")
        .map("active", "enabled")
        .map("emails[type eq \"work\"].value", "mail")
        .map(format!("{}:employeeNumber", ENTERPRISE), "badge")
}

pub fn group_table() -> MappingTable {
    MappingTable::new("Group", "hr")
        .map("id", "id")
        .map("displayName", "name")
        .map("members", "members")
}

pub fn bjensen_record() -> Value {
    json!({
        "id": BJENSEN_ID,
        "login": "BJensen",
        "first_name": "Barbara",
        "last_name": "Jensen",
        "display_name": "Babs Jensen",
        "title": "Tour Guide",
        "enabled": true,
        "mail": "bjensen@example.com",
        "badge": "701984"
    })
}

/// Five users, bjensen first.
pub fn user_records() -> Vec<Value> {
    let others = [
        ("a1b2c3d4-0000-4000-8000-000000000002", "jsmith", "John", "Smith", true),
        ("a1b2c3d4-0000-4000-8000-000000000003", "mpepper", "Mary", "Pepper", true),
        ("a1b2c3d4-0000-4000-8000-000000000004", "tlee", "Tom", "Lee", false),
        ("a1b2c3d4-0000-4000-8000-000000000005", "akumar", "Anil", "Kumar", true),
    ];
    std::iter::once(bjensen_record())
        .chain(others.iter().map(|(id, login, first, last, enabled)| {
            json!({
                "id": id,
                "login": login,
                "first_name": first,
                "last_name": last,
                "display_name": format!("{} {}", first, last),
                "enabled": enabled,
                "mail": format!("{}@example.com", login)
            })
        }))
        .collect()
}

pub fn tour_guides_record() -> Value {
    json!({
        "id": TOUR_GUIDES_ID,
        "name": "Tour Guides",
        "members": [
            { "value": BJENSEN_ID, "display": "Babs Jensen" }
        ]
    })
}

/// A client-side create body for a new user.
pub fn new_user_body(user_name: &str) -> Value {
    json!({
        "schemas": [USER_SCHEMA],
        "userName": user_name,
        "name": { "givenName": "Kim", "familyName": "Park" },
        "emails": [{ "value": format!("{}@example.com", user_name), "type": "work" }],
        "active": true
    })
}
