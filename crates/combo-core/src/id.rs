//! Identity types for combo fields
//!
//! Field types and config ids are strings because they come from server-side
//! configuration; widget handles are process-local counters.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Logical field category, e.g. `client/client` or `hosting/account`.
///
/// Unique within one form, not globally.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldType(pub String);

impl FieldType {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        FieldType(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldType({})", self.0)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        FieldType(name.to_string())
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        FieldType(name)
    }
}

/// Config registry key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub String);

impl ConfigId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        ConfigId(id.into())
    }

    /// Stable id for a behavior signature: hex SHA-256 of the type followed by
    /// the serialized options.
    pub fn derive(field_type: &FieldType, serialized_options: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(field_type.as_str().as_bytes());
        hasher.update(serialized_options.as_bytes());
        ConfigId(format!("{:x}", hasher.finalize()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config({})", self.0)
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigId {
    fn from(id: &str) -> Self {
        ConfigId(id.to_string())
    }
}

/// Owner token for one attached widget.
///
/// A fresh handle is issued every time a field is registered, so a response
/// addressed to a destroyed field never matches a live one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WidgetHandle(pub u64);

impl WidgetHandle {
    pub const ZERO: WidgetHandle = WidgetHandle(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        WidgetHandle(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        WidgetHandle(self.0 + 1)
    }
}

impl fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Widget({:08x})", self.0)
    }
}

impl fmt::Display for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}
