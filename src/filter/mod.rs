//! SCIM filter expressions.
//!
//! - [`parser`] turns filter text (RFC 7644 §3.4.2.2) and PATCH paths into trees
//! - [`ast`] holds the tree types and their canonical rendering
//! - [`eval`] evaluates a tree against resource JSON
//!
//! # Examples
//!
//! ```rust
//! use scim_adapter::filter::{FilterEvaluator, parse_filter};
//! use serde_json::json;
//!
//! let filter = parse_filter(r#"userName eq "bjensen" and active eq true"#).unwrap();
//! assert_eq!(parse_filter(&filter.to_string()).unwrap(), filter);
//!
//! let user = json!({ "userName": "BJensen", "active": true });
//! assert!(FilterEvaluator::new().matches(&filter, &user));
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{AttributePath, CompareOp, FilterNode, FilterValue, LogicalOp, PathExpression};
pub use eval::FilterEvaluator;
pub use parser::{
    FilterParser, FilterSyntaxError, MAX_FILTER_DEPTH, MAX_FILTER_LENGTH, parse_filter,
};
