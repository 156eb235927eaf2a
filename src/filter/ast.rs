//! Filter expression tree.
//!
//! A parsed filter is an immutable [`FilterNode`] tree. Its `Display`
//! implementation renders the canonical form: re-parsing that text yields a
//! tree equal to the original.

use serde_json::Number;
use std::fmt;

/// An attribute reference: optional schema URN, attribute name and optional
/// sub-attribute (`urn:...:User:name.givenName`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    /// Schema URN prefix, when the path was written fully qualified
    pub urn: Option<String>,
    /// Attribute name. Empty only when the path names a whole extension schema.
    pub name: String,
    /// Sub-attribute of a complex attribute
    pub sub_attribute: Option<String>,
}

impl AttributePath {
    /// Create a simple attribute path
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            urn: None,
            name: name.into(),
            sub_attribute: None,
        }
    }

    /// Create a nested attribute path (e.g., "name.familyName")
    pub fn nested(name: impl Into<String>, sub_attribute: impl Into<String>) -> Self {
        Self {
            urn: None,
            name: name.into(),
            sub_attribute: Some(sub_attribute.into()),
        }
    }

    /// Path naming a whole extension schema object.
    pub fn schema_root(urn: impl Into<String>) -> Self {
        Self {
            urn: Some(urn.into()),
            name: String::new(),
            sub_attribute: None,
        }
    }

    pub fn with_urn(mut self, urn: impl Into<String>) -> Self {
        self.urn = Some(urn.into());
        self
    }

    pub fn is_schema_root(&self) -> bool {
        self.name.is_empty()
    }

    /// The path without its URN prefix, e.g. "name.givenName".
    pub fn relative(&self) -> String {
        match &self.sub_attribute {
            Some(sub) => format!("{}.{}", self.name, sub),
            None => self.name.clone(),
        }
    }

    /// Case-insensitive equality, as SCIM attribute names are.
    pub fn matches(&self, other: &AttributePath) -> bool {
        fn eq_opt(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
        }
        self.name.eq_ignore_ascii_case(&other.name)
            && eq_opt(&self.sub_attribute, &other.sub_attribute)
            && eq_opt(&self.urn, &other.urn)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.urn {
            Some(urn) if self.name.is_empty() => return f.write_str(urn),
            Some(urn) => write!(f, "{}:", urn)?,
            None => {}
        }
        f.write_str(&self.name)?;
        if let Some(sub) = &self.sub_attribute {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

/// Attribute operators (RFC 7644 §3.4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Present (has value)
    Pr,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl CompareOp {
    /// Parse an operator keyword, ignoring case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let op = match keyword.to_ascii_lowercase().as_str() {
            "eq" => CompareOp::Eq,
            "ne" => CompareOp::Ne,
            "co" => CompareOp::Co,
            "sw" => CompareOp::Sw,
            "ew" => CompareOp::Ew,
            "pr" => CompareOp::Pr,
            "gt" => CompareOp::Gt,
            "ge" => CompareOp::Ge,
            "lt" => CompareOp::Lt,
            "le" => CompareOp::Le,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le
        )
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Co => "co",
            CompareOp::Sw => "sw",
            CompareOp::Ew => "ew",
            CompareOp::Pr => "pr",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        };
        f.write_str(s)
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
            LogicalOp::Not => "not",
        })
    }
}

/// Comparison literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Boolean(bool),
    Number(Number),
    Null,
}

impl FilterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to the equivalent JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FilterValue::String(s) => serde_json::Value::String(s.clone()),
            FilterValue::Boolean(b) => serde_json::Value::Bool(*b),
            FilterValue::Number(n) => serde_json::Value::Number(n.clone()),
            FilterValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // JSON string encoding matches the literal grammar exactly
            FilterValue::String(s) => {
                let encoded = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
            FilterValue::Boolean(b) => write!(f, "{}", b),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Null => f.write_str("null"),
        }
    }
}

/// A parsed SCIM filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `path op value`; `value` is `None` exactly when `op` is `pr`
    Comparison {
        path: AttributePath,
        op: CompareOp,
        value: Option<FilterValue>,
    },
    /// `and` / `or` over two or more children, or `not` over exactly one
    Logical {
        op: LogicalOp,
        children: Vec<FilterNode>,
    },
    /// Parenthesised expression
    Group(Box<FilterNode>),
    /// `attr[filter]`, with the inner filter scoped to the attribute's
    /// sub-attributes
    ValuePath {
        path: AttributePath,
        filter: Box<FilterNode>,
    },
}

impl FilterNode {
    pub fn compare(path: AttributePath, op: CompareOp, value: FilterValue) -> Self {
        FilterNode::Comparison {
            path,
            op,
            value: Some(value),
        }
    }

    pub fn present(path: AttributePath) -> Self {
        FilterNode::Comparison {
            path,
            op: CompareOp::Pr,
            value: None,
        }
    }

    pub fn not(child: FilterNode) -> Self {
        FilterNode::Logical {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }

    /// Combine with `and`, flattening nested conjunctions.
    pub fn and(self, other: FilterNode) -> Self {
        let mut children = match self {
            FilterNode::Logical {
                op: LogicalOp::And,
                children,
            } => children,
            disjunction @ FilterNode::Logical {
                op: LogicalOp::Or, ..
            } => vec![FilterNode::Group(Box::new(disjunction))],
            node => vec![node],
        };
        match other {
            FilterNode::Logical {
                op: LogicalOp::And,
                children: rest,
            } => children.extend(rest),
            rest @ FilterNode::Logical {
                op: LogicalOp::Or, ..
            } => children.push(FilterNode::Group(Box::new(rest))),
            rest => children.push(rest),
        }
        FilterNode::Logical {
            op: LogicalOp::And,
            children,
        }
    }

    /// Every attribute path referenced anywhere in the tree. Paths inside a
    /// value filter are reported relative to their parent attribute.
    pub fn paths(&self) -> Vec<&AttributePath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a AttributePath>) {
        match self {
            FilterNode::Comparison { path, .. } => out.push(path),
            FilterNode::Logical { children, .. } => {
                children.iter().for_each(|child| child.collect_paths(out))
            }
            FilterNode::Group(inner) => inner.collect_paths(out),
            FilterNode::ValuePath { path, filter } => {
                out.push(path);
                filter.collect_paths(out);
            }
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison {
                path,
                op,
                value: Some(value),
            } => write!(f, "{} {} {}", path, op, value),
            FilterNode::Comparison { path, op, value: None } => write!(f, "{} {}", path, op),
            FilterNode::Logical {
                op: LogicalOp::Not,
                children,
            } => {
                f.write_str("not (")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            FilterNode::Logical { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op)?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
            FilterNode::Group(inner) => write!(f, "({})", inner),
            FilterNode::ValuePath { path, filter } => write!(f, "{}[{}]", path, filter),
        }
    }
}

/// A PATCH-style path: `attrPath`, `attrPath[valFilter]` or
/// `attrPath[valFilter].subAttr` (RFC 7644 §3.5.2).
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    pub attribute: AttributePath,
    /// Element selector for multi-valued attributes
    pub filter: Option<FilterNode>,
    /// Sub-attribute following a value filter
    pub sub_attribute: Option<String>,
}

impl PathExpression {
    pub fn attribute(attribute: AttributePath) -> Self {
        Self {
            attribute,
            filter: None,
            sub_attribute: None,
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attribute)?;
        if let Some(filter) = &self.filter {
            write!(f, "[{}]", filter)?;
        }
        if let Some(sub) = &self.sub_attribute {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}
