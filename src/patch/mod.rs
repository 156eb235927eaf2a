//! SCIM PATCH support: parsing PatchOp messages and applying their
//! operations to resource JSON.
//!
//! ```rust
//! use scim_adapter::patch::{PatchApplier, PatchRequest};
//! use scim_adapter::schema::SchemaRegistry;
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new().unwrap();
//! let request = PatchRequest::from_json(
//!     &json!([{ "op": "replace", "path": "name.givenName", "value": "Bob" }]),
//!     &registry,
//!     "User",
//! )
//! .unwrap();
//!
//! let patched = PatchApplier::new(&registry, "User")
//!     .apply(&json!({ "name": { "givenName": "Robert" } }), &request.operations)
//!     .unwrap();
//! assert_eq!(patched, json!({ "name": { "givenName": "Bob" } }));
//! ```

pub mod apply;
pub mod operation;

pub use apply::{NoTargetPolicy, PatchApplier};
pub use operation::{PATCH_OP_SCHEMA, PatchOpType, PatchOperation, PatchPath, PatchRequest};
