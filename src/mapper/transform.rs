//! Named value transforms applied between backend fields and SCIM
//! attributes.
//!
//! Every transform has a backend → SCIM direction and a SCIM → backend
//! direction. An invertible transform guarantees
//! `to_backend(to_scim(v)) == v`; a lossy one (`lowercase`) passes values
//! back unchanged.

use crate::error::{BuildError, BuildResult};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One direction of a transform.
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A named, pure, bidirectional value conversion.
#[derive(Clone)]
pub struct Transform {
    name: String,
    to_scim: TransformFn,
    to_backend: TransformFn,
    invertible: bool,
}

impl Transform {
    pub fn new(
        name: impl Into<String>,
        to_scim: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
        to_backend: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
        invertible: bool,
    ) -> Self {
        Self {
            name: name.into(),
            to_scim: Arc::new(to_scim),
            to_backend: Arc::new(to_backend),
            invertible,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_invertible(&self) -> bool {
        self.invertible
    }

    pub fn is_identity(&self) -> bool {
        self.name == IDENTITY
    }

    pub fn to_scim(&self, value: &Value) -> Result<Value, String> {
        (self.to_scim)(value)
    }

    pub fn to_backend(&self, value: &Value) -> Result<Value, String> {
        (self.to_backend)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("invertible", &self.invertible)
            .finish()
    }
}

const IDENTITY: &str = "identity";

/// Transforms available to mapping tables, by name.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRegistry {
    /// Registry holding the built-in transforms.
    pub fn new() -> Self {
        let mut registry = Self {
            transforms: HashMap::new(),
        };
        for transform in builtins() {
            registry
                .transforms
                .insert(transform.name.clone(), transform);
        }
        registry
    }

    /// Add a custom transform. Names are unique, built-ins included.
    pub fn register(&mut self, transform: Transform) -> BuildResult<()> {
        if self.transforms.contains_key(&transform.name) {
            return Err(BuildError::InvalidConfiguration {
                message: format!("Transform '{}' is already registered", transform.name),
            });
        }
        self.transforms.insert(transform.name.clone(), transform);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value))
}

fn expect_bool(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected a boolean, got {}", value))
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

fn builtins() -> Vec<Transform> {
    vec![
        Transform::new(IDENTITY, |v| Ok(v.clone()), |v| Ok(v.clone()), true),
        Transform::new(
            "lowercase",
            |v| Ok(Value::String(expect_str(v)?.to_lowercase())),
            |v| Ok(v.clone()),
            false,
        ),
        Transform::new(
            "uppercase",
            |v| Ok(Value::String(expect_str(v)?.to_uppercase())),
            |v| Ok(v.clone()),
            false,
        ),
        Transform::new(
            "string_to_bool",
            |v| Ok(Value::Bool(parse_bool(expect_str(v)?)?)),
            |v| Ok(Value::String(expect_bool(v)?.to_string())),
            true,
        ),
        Transform::new(
            "bool_to_string",
            |v| Ok(Value::String(expect_bool(v)?.to_string())),
            |v| Ok(Value::Bool(parse_bool(expect_str(v)?)?)),
            true,
        ),
        Transform::new(
            "string_to_integer",
            |v| {
                let text = expect_str(v)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| format!("'{}' is not an integer: {}", text, e))
            },
            |v| match v.as_i64() {
                Some(n) => Ok(Value::String(n.to_string())),
                None => Err(format!("expected an integer, got {}", v)),
            },
            true,
        ),
        Transform::new(
            "negate_bool",
            |v| Ok(Value::Bool(!expect_bool(v)?)),
            |v| Ok(Value::Bool(!expect_bool(v)?)),
            true,
        ),
        Transform::new(
            "epoch_seconds_to_datetime",
            |v| {
                let seconds = v
                    .as_i64()
                    .ok_or_else(|| format!("expected epoch seconds, got {}", v))?;
                let instant = DateTime::<Utc>::from_timestamp(seconds, 0)
                    .ok_or_else(|| format!("{} is out of range", seconds))?;
                Ok(Value::String(
                    instant.to_rfc3339_opts(SecondsFormat::Secs, true),
                ))
            },
            |v| {
                let text = expect_str(v)?;
                DateTime::parse_from_rfc3339(text)
                    .map(|instant| Value::from(instant.timestamp()))
                    .map_err(|e| format!("'{}' is not an RFC 3339 dateTime: {}", text, e))
            },
            true,
        ),
    ]
}
