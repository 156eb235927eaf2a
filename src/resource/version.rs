//! Resource versions rendered as weak ETags (RFC 7644 §3.14).
//!
//! A backend may supply its own version identifier (a sequence number, a
//! timestamp); otherwise one is derived deterministically from the
//! resource content with SHA-256.
//!
//! ```rust
//! use scim_adapter::resource::ResourceVersion;
//!
//! let version = ResourceVersion::from_content(br#"{"id":"123","userName":"bjensen"}"#);
//! let etag = version.to_string();
//! assert!(etag.starts_with("W/\""));
//!
//! let parsed: ResourceVersion = etag.parse().unwrap();
//! assert_eq!(parsed, version);
//! ```

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Opaque version identifier of a resource.
///
/// Equality compares the opaque value only, so a weak and a strong ETag
/// for the same value are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceVersion {
    opaque: String,
}

impl ResourceVersion {
    /// Version derived from resource content.
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let hash = hasher.finalize();
        Self {
            // First 8 bytes keep ETags short
            opaque: BASE64.encode(&hash[..8]),
        }
    }

    /// Version derived from a JSON document's canonical serialisation.
    pub fn from_json(value: &Value) -> Self {
        // serde_json maps are ordered, so equal documents hash equally
        Self::from_content(value.to_string().as_bytes())
    }

    /// Backend-supplied version identifier.
    pub fn from_hash(hash: impl AsRef<str>) -> Self {
        Self {
            opaque: hash.as_ref().to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.opaque
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W/\"{}\"", self.opaque)
    }
}

/// Parses `W/"x"`, `"x"` or a bare `x`.
impl FromStr for ResourceVersion {
    type Err = VersionError;

    fn from_str(etag: &str) -> Result<Self, Self::Err> {
        let trimmed = etag.trim();
        let unprefixed = trimmed.strip_prefix("W/").unwrap_or(trimmed);

        let opaque = match unprefixed.strip_prefix('"') {
            Some(rest) => rest
                .strip_suffix('"')
                .ok_or_else(|| VersionError::InvalidEtagFormat(etag.to_string()))?,
            None if unprefixed.len() < trimmed.len() => {
                return Err(VersionError::InvalidEtagFormat(etag.to_string()));
            }
            None => unprefixed,
        };

        if opaque.is_empty() {
            return Err(VersionError::InvalidEtagFormat(etag.to_string()));
        }
        Ok(Self::from_hash(opaque))
    }
}

impl Serialize for ResourceVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid ETag format: {0}")]
    InvalidEtagFormat(String),
}
