//! SCIM 2.0 filter parser (RFC 7644 §3.4.2.2).
//!
//! ## Grammar
//!
//! ```text
//! filter     = orExpr
//! orExpr     = andExpr { "or" andExpr }
//! andExpr    = notExpr { "and" notExpr }
//! notExpr    = "not" "(" filter ")" | "(" filter ")" | attrExpr
//! attrExpr   = attrPath "pr"
//!            | attrPath compareOp compValue
//!            | attrPath "[" filter "]" [ "." ATTRNAME compareOp compValue ]
//! attrPath   = [URN ":"] ATTRNAME ["." ATTRNAME]
//! compareOp  = "eq" | "ne" | "co" | "sw" | "ew" | "gt" | "ge" | "lt" | "le"
//! compValue  = "true" | "false" | "null" | NUMBER | STRING
//! ```
//!
//! Keywords and operators are case-insensitive. Literals follow JSON syntax.
//!
//! `emails[type eq "work"].value eq "x"` is accepted and normalised to
//! `emails[type eq "work" and value eq "x"]`.
//!
//! ## Limits
//!
//! - Maximum filter length: 4096 bytes
//! - Maximum nesting depth: 32 levels

use super::ast::{AttributePath, CompareOp, FilterNode, FilterValue, PathExpression};
use crate::error::ScimError;
use crate::schema::{AttributeDefinition, SchemaRegistry};

use serde_json::Number;

/// Maximum allowed length of a SCIM filter expression (bytes).
pub const MAX_FILTER_LENGTH: usize = 4096;

/// Maximum allowed nesting depth of a SCIM filter expression.
pub const MAX_FILTER_DEPTH: usize = 32;

/// Filter or path could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct FilterSyntaxError {
    pub message: String,
    /// Byte offset into the input where the problem was detected
    pub offset: usize,
}

impl FilterSyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl From<FilterSyntaxError> for ScimError {
    fn from(error: FilterSyntaxError) -> Self {
        ScimError::InvalidFilter {
            message: error.message,
            offset: error.offset,
        }
    }
}

/// Parse a filter without schema checks.
pub fn parse_filter(input: &str) -> Result<FilterNode, FilterSyntaxError> {
    FilterParser::new().parse(input)
}

#[derive(Debug, Clone, Copy)]
struct Scope<'r> {
    registry: &'r SchemaRegistry,
    resource_type: &'r str,
}

/// Filter and path parser.
///
/// A scoped parser rejects attributes the resource type does not define and
/// rewrites attribute names to their declared spelling.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterParser<'r> {
    scope: Option<Scope<'r>>,
}

impl<'r> FilterParser<'r> {
    /// Parser that accepts any attribute name.
    pub fn new() -> Self {
        Self { scope: None }
    }

    /// Parser checking attribute names against a resource type's schemas.
    pub fn scoped(registry: &'r SchemaRegistry, resource_type: &'r str) -> Self {
        Self {
            scope: Some(Scope {
                registry,
                resource_type,
            }),
        }
    }

    /// Parse a complete filter expression.
    pub fn parse(&self, input: &str) -> Result<FilterNode, FilterSyntaxError> {
        let mut cursor = Cursor::new(input, self.scope)?;
        let node = cursor.parse_or(Frame::RESOURCE)?;
        cursor.expect_end()?;
        Ok(node)
    }

    /// Parse a PATCH operation path.
    pub fn parse_path(&self, input: &str) -> Result<PathExpression, FilterSyntaxError> {
        let mut cursor = Cursor::new(input, self.scope)?;
        let path = cursor.parse_path_expression()?;
        cursor.expect_end()?;
        Ok(path)
    }
}

/// Where in the tree attribute names are being resolved.
#[derive(Debug, Clone, Copy)]
struct Frame<'r> {
    in_value_filter: bool,
    /// Definition of the attribute whose sub-attributes are in scope
    parent: Option<&'r AttributeDefinition>,
}

impl Frame<'_> {
    const RESOURCE: Frame<'static> = Frame {
        in_value_filter: false,
        parent: None,
    };
}

struct Cursor<'a, 'r> {
    input: &'a str,
    position: usize,
    depth: usize,
    scope: Option<Scope<'r>>,
}

impl<'a, 'r> Cursor<'a, 'r> {
    fn new(input: &'a str, scope: Option<Scope<'r>>) -> Result<Self, FilterSyntaxError> {
        if input.len() > MAX_FILTER_LENGTH {
            return Err(FilterSyntaxError::new(
                format!(
                    "Filter exceeds maximum length ({} bytes, max {})",
                    input.len(),
                    MAX_FILTER_LENGTH
                ),
                0,
            ));
        }
        Ok(Self {
            input,
            position: 0,
            depth: 0,
            scope,
        })
    }

    fn error(&self, message: impl Into<String>) -> FilterSyntaxError {
        FilterSyntaxError::new(message, self.position)
    }

    fn expect_end(&mut self) -> Result<(), FilterSyntaxError> {
        self.skip_whitespace();
        if self.position < self.input.len() {
            return Err(self.error(format!(
                "Unexpected input '{}'",
                &self.input[self.position..]
            )));
        }
        Ok(())
    }

    fn enter_scope(&mut self) -> Result<(), FilterSyntaxError> {
        self.depth += 1;
        if self.depth > MAX_FILTER_DEPTH {
            return Err(self.error(format!(
                "Filter exceeds maximum nesting depth ({})",
                MAX_FILTER_DEPTH
            )));
        }
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn expect_char(&mut self, expected: char, context: &str) -> Result<(), FilterSyntaxError> {
        self.skip_whitespace();
        if self.try_char(expected) {
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}' {}", expected, context)))
        }
    }

    // orExpr = andExpr { "or" andExpr }
    fn parse_or(&mut self, frame: Frame<'r>) -> Result<FilterNode, FilterSyntaxError> {
        let mut children = vec![self.parse_and(frame)?];
        while self.try_keyword("or") {
            children.push(self.parse_and(frame)?);
        }
        Ok(logical(super::ast::LogicalOp::Or, children))
    }

    // andExpr = notExpr { "and" notExpr }
    fn parse_and(&mut self, frame: Frame<'r>) -> Result<FilterNode, FilterSyntaxError> {
        let mut children = vec![self.parse_not(frame)?];
        while self.try_keyword("and") {
            children.push(self.parse_not(frame)?);
        }
        Ok(logical(super::ast::LogicalOp::And, children))
    }

    // notExpr = "not" "(" filter ")" | "(" filter ")" | attrExpr
    fn parse_not(&mut self, frame: Frame<'r>) -> Result<FilterNode, FilterSyntaxError> {
        self.skip_whitespace();

        if self.try_keyword("not") {
            self.expect_char('(', "after 'not'")?;
            self.enter_scope()?;
            let inner = self.parse_or(frame)?;
            self.exit_scope();
            self.expect_char(')', "to close 'not' expression")?;
            return Ok(FilterNode::not(inner));
        }

        if self.try_char('(') {
            self.enter_scope()?;
            let inner = self.parse_or(frame)?;
            self.exit_scope();
            self.expect_char(')', "to close grouped expression")?;
            return Ok(FilterNode::Group(Box::new(inner)));
        }

        self.parse_attr_expr(frame)
    }

    fn parse_attr_expr(&mut self, frame: Frame<'r>) -> Result<FilterNode, FilterSyntaxError> {
        self.skip_whitespace();
        let (path, definition) = self.parse_attr_path(frame)?;

        if self.peek() == Some('[') {
            let filter = self.parse_value_filter(&path, definition, frame)?;

            if !self.try_char('.') {
                return Ok(FilterNode::ValuePath {
                    path,
                    filter: Box::new(filter),
                });
            }

            let sub_frame = Frame {
                in_value_filter: true,
                parent: definition,
            };
            let (sub_path, _) = self.parse_attr_path(sub_frame)?;
            let comparison = self.parse_comparison(sub_path)?;
            return Ok(FilterNode::ValuePath {
                path,
                filter: Box::new(filter.and(comparison)),
            });
        }

        self.parse_comparison(path)
    }

    /// `"[" filter "]"` following an attribute path.
    fn parse_value_filter(
        &mut self,
        path: &AttributePath,
        definition: Option<&'r AttributeDefinition>,
        frame: Frame<'r>,
    ) -> Result<FilterNode, FilterSyntaxError> {
        if frame.in_value_filter {
            return Err(self.error("Nested value filters are not supported"));
        }
        if path.sub_attribute.is_some() || path.is_schema_root() {
            return Err(self.error(format!("Value filter not allowed after '{}'", path)));
        }
        if definition.is_some_and(|def| !def.is_complex()) {
            return Err(self.error(format!(
                "Value filter requires a complex attribute, '{}' is not",
                path
            )));
        }

        self.try_char('[');
        self.enter_scope()?;
        let filter = self.parse_or(Frame {
            in_value_filter: true,
            parent: definition,
        })?;
        self.exit_scope();
        self.expect_char(']', "to close value filter")?;
        Ok(filter)
    }

    /// Operator and (except for `pr`) literal following a path.
    fn parse_comparison(&mut self, path: AttributePath) -> Result<FilterNode, FilterSyntaxError> {
        self.skip_whitespace();
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
        let keyword = &self.input[start..self.position];
        if keyword.is_empty() {
            return Err(self.error(format!("Expected operator after '{}'", path)));
        }
        let op = CompareOp::from_keyword(keyword).ok_or_else(|| {
            FilterSyntaxError::new(format!("Unknown operator '{}'", keyword), start)
        })?;

        if op == CompareOp::Pr {
            return Ok(FilterNode::present(path));
        }

        let value = self.parse_value()?;
        Ok(FilterNode::compare(path, op, value))
    }

    /// Path grammar for PATCH: `attrPath [ "[" filter "]" [ "." ATTRNAME ] ]`.
    fn parse_path_expression(&mut self) -> Result<PathExpression, FilterSyntaxError> {
        self.skip_whitespace();
        let start = self.position;
        let token = self.read_path_token()?;

        if let Some(root) = self.schema_root(token) {
            return Ok(PathExpression::attribute(root));
        }

        let (attribute, definition) = self.resolve_path(token, start, Frame::RESOURCE)?;
        if self.peek() != Some('[') {
            return Ok(PathExpression::attribute(attribute));
        }

        let filter = self.parse_value_filter(&attribute, definition, Frame::RESOURCE)?;
        let sub_attribute = if self.try_char('.') {
            let sub_frame = Frame {
                in_value_filter: true,
                parent: definition,
            };
            let sub_start = self.position;
            let sub_token = self.read_path_token()?;
            let (sub_path, _) = self.resolve_path(sub_token, sub_start, sub_frame)?;
            Some(sub_path.name)
        } else {
            None
        };

        Ok(PathExpression {
            attribute,
            filter: Some(filter),
            sub_attribute,
        })
    }

    fn parse_attr_path(
        &mut self,
        frame: Frame<'r>,
    ) -> Result<(AttributePath, Option<&'r AttributeDefinition>), FilterSyntaxError> {
        let start = self.position;
        let token = self.read_path_token()?;
        self.resolve_path(token, start, frame)
    }

    /// A bare extension URN, which only a scoped parser can recognise.
    fn schema_root(&self, token: &str) -> Option<AttributePath> {
        let scope = self.scope?;
        let (schema, relative) = scope
            .registry
            .schema_for_path(scope.resource_type, token)
            .ok()?;
        relative
            .is_empty()
            .then(|| AttributePath::schema_root(schema.id.clone()))
    }

    /// Turn a raw path token into an [`AttributePath`], resolving and
    /// canonicalising it when the parser is scoped.
    fn resolve_path(
        &self,
        token: &str,
        offset: usize,
        frame: Frame<'r>,
    ) -> Result<(AttributePath, Option<&'r AttributeDefinition>), FilterSyntaxError> {
        let fail = |message: String| FilterSyntaxError::new(message, offset);
        let is_urn = token.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("urn:"));

        if frame.in_value_filter {
            if is_urn || token.contains('.') {
                return Err(fail(format!(
                    "'{}' is not a sub-attribute reference",
                    token
                )));
            }
            let name = match frame.parent {
                Some(parent) => {
                    let sub = parent.sub_attribute(token).ok_or_else(|| {
                        fail(format!(
                            "Unknown sub-attribute '{}' of '{}'",
                            token, parent.name
                        ))
                    })?;
                    return Ok((AttributePath::simple(sub.name.clone()), Some(sub)));
                }
                None => token,
            };
            return Ok((AttributePath::simple(name), None));
        }

        let Some(scope) = self.scope else {
            let (urn, relative) = match token.rsplit_once(':') {
                Some((urn, relative)) if is_urn => (Some(urn), relative),
                _ => (None, token),
            };
            let mut path = split_relative(relative).map_err(|m| fail(m.to_string()))?;
            path.urn = urn.map(str::to_string);
            return Ok((path, None));
        };

        let (schema, relative) = scope
            .registry
            .schema_for_path(scope.resource_type, token)
            .map_err(|e| fail(e.to_string()))?;
        let raw = split_relative(relative).map_err(|m| fail(m.to_string()))?;

        let top = schema.attribute(&raw.name).ok_or_else(|| {
            fail(format!(
                "Unknown attribute '{}' in schema '{}'",
                raw.name, schema.id
            ))
        })?;
        let mut path = AttributePath::simple(top.name.clone());
        let mut definition = top;
        if let Some(sub) = &raw.sub_attribute {
            let sub_def = top.sub_attribute(sub).ok_or_else(|| {
                fail(format!("Unknown sub-attribute '{}' of '{}'", sub, top.name))
            })?;
            path.sub_attribute = Some(sub_def.name.clone());
            definition = sub_def;
        }
        if is_urn {
            path.urn = Some(schema.id.clone());
        }
        Ok((path, Some(definition)))
    }

    /// Read `[URN:]name[.sub]` characters. Brackets end the token.
    fn read_path_token(&mut self) -> Result<&'a str, FilterSyntaxError> {
        let start = self.position;
        if !self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '$')
        {
            return Err(self.error("Expected attribute name"));
        }
        while self.peek().is_some_and(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$' | ':' | '.')
        }) {
            self.advance();
        }
        Ok(&self.input[start..self.position])
    }

    fn parse_value(&mut self) -> Result<FilterValue, FilterSyntaxError> {
        self.skip_whitespace();

        if self.peek() == Some('"') {
            return self.parse_string_value();
        }
        if self.try_keyword("true") {
            return Ok(FilterValue::Boolean(true));
        }
        if self.try_keyword("false") {
            return Ok(FilterValue::Boolean(false));
        }
        if self.try_keyword("null") {
            return Ok(FilterValue::Null);
        }
        if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '-') {
            return self.parse_number_value();
        }

        Err(self.error("Expected value (string, boolean, number, or null)"))
    }

    fn parse_string_value(&mut self) -> Result<FilterValue, FilterSyntaxError> {
        let start = self.position;
        self.advance();

        let mut escaped = false;
        loop {
            match self.peek() {
                None => {
                    return Err(FilterSyntaxError::new("Unterminated string literal", start));
                }
                Some('\\') if !escaped => escaped = true,
                Some('"') if !escaped => {
                    self.advance();
                    break;
                }
                Some(_) => escaped = false,
            }
            self.advance();
        }

        serde_json::from_str::<String>(&self.input[start..self.position])
            .map(FilterValue::String)
            .map_err(|e| FilterSyntaxError::new(format!("Malformed string literal: {}", e), start))
    }

    fn parse_number_value(&mut self) -> Result<FilterValue, FilterSyntaxError> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.advance();
        }

        let literal = &self.input[start..self.position];
        serde_json::from_str::<Number>(literal)
            .map(FilterValue::Number)
            .map_err(|_| FilterSyntaxError::new(format!("Malformed number '{}'", literal), start))
    }

    // Helper methods

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn try_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();

        let remaining = &self.input[self.position..];
        if remaining.len() >= keyword.len()
            && remaining.is_char_boundary(keyword.len())
            && remaining[..keyword.len()].eq_ignore_ascii_case(keyword)
        {
            // Make sure keyword is not part of a larger identifier
            let after_keyword = remaining[keyword.len()..].chars().next();
            if after_keyword.is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
                self.position += keyword.len();
                return true;
            }
        }

        false
    }
}

fn logical(op: super::ast::LogicalOp, mut children: Vec<FilterNode>) -> FilterNode {
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    FilterNode::Logical { op, children }
}

/// Split `name[.sub]` into an unqualified path.
fn split_relative(relative: &str) -> Result<AttributePath, &'static str> {
    let mut parts = relative.split('.');
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err("Expected attribute name");
    }
    let sub = parts.next();
    if parts.next().is_some() {
        return Err("Attribute paths support at most one sub-attribute level");
    }
    match sub {
        Some("") => Err("Expected sub-attribute name after '.'"),
        Some(sub) => Ok(AttributePath::nested(name, sub)),
        None => Ok(AttributePath::simple(name)),
    }
}
