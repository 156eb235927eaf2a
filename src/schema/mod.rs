//! Schema definitions and validation for SCIM resources.
//!
//! This module provides the schema registry and validation engine implementing
//! RFC 7643 SCIM core schemas.
//!
//! # Key Types
//!
//! - [`Schema`] - SCIM schema definition with attributes and metadata
//! - [`SchemaRegistry`] - Registry for managing and accessing schemas
//! - [`AttributeDefinition`] - Individual attribute definitions and constraints
//! - [`ResourceType`] - Binds an endpoint to a core schema and its extensions
//!
//! # Examples
//!
//! ```rust
//! use scim_adapter::schema::SchemaRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::new()?;
//! let user_schema = registry.lookup("User")?;
//! let given_name = registry.attribute(user_schema, "name.givenName")?;
//! assert!(!given_name.case_exact);
//! # Ok(())
//! # }
//! ```

pub mod embedded;
pub mod registry;
pub mod types;
pub mod validation;


// Re-export the main types for convenience
pub use registry::SchemaRegistry;
pub use types::{
    AttributeDefinition, AttributeType, Mutability, ResourceType, Returned, Schema,
    SchemaExtension, Uniqueness,
};
pub use validation::OperationContext;
pub(crate) use validation::lookup_ignore_case;
