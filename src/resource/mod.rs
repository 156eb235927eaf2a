//! SCIM resource model.
//!
//! * [`ScimResource`] - common attributes, `meta` and the attribute map
//! * [`Meta`] - resource metadata
//! * [`ResourceVersion`] - weak-ETag versions, backend-supplied or content derived

#[allow(clippy::module_inception)]
pub mod resource;
pub mod version;

pub use resource::{Meta, ScimResource};
pub use version::{ResourceVersion, VersionError};
