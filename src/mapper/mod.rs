//! Bidirectional mapping between backend records and SCIM resources.
//!
//! Mappings are data, not code: a [`MappingTable`] lists which SCIM
//! attribute each backend field corresponds to, optionally through a named
//! [`Transform`]. [`ResourceMapper`] compiles a table against the schema
//! registry and performs the conversions.
//!
//! ```rust
//! use scim_adapter::mapper::{MappingTable, ResourceMapper, TransformRegistry};
//! use scim_adapter::schema::SchemaRegistry;
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new().unwrap();
//! let table = MappingTable::new("User", "hr")
//!     .map("id", "uid")
//!     .map("userName", "login")
//!     .map("emails[type eq \"work\"].value", "mail");
//! let mapper = ResourceMapper::new(table, &registry, &TransformRegistry::new()).unwrap();
//!
//! let record = json!({ "uid": "42", "login": "bjensen", "mail": "bjensen@example.com" });
//! let user = mapper.to_scim(&record).unwrap();
//! assert_eq!(user.to_json()["emails"][0]["type"], "work");
//! assert_eq!(mapper.to_backend(&user).unwrap(), record);
//! ```

pub mod engine;
pub mod table;
pub mod transform;

pub use engine::{IncompleteMapping, MappingError, ResourceMapper};
pub use table::{MappingEntry, MappingTable};
pub use transform::{Transform, TransformFn, TransformRegistry};
