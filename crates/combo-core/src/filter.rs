//! Declarative filter specifications
//!
//! A filter spec maps output parameter names to terms. Accepted JSON shapes:
//!
//! ```text
//! ["login", "client"]                          list of field shorthands
//! {"login_like": "hosting/account"}            key -> source field
//! {"client_id": {"field": "client", "format": "id"}}
//! {"type": {"format": "seller"}}               static value
//! {"return": ["id", "text"]}                   non-string values are literals
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{FieldType, SourceField};

/// Custom formatter: `(source id, source text, source field) -> value`.
/// Returning `None` omits the term.
pub type FormatFn = Arc<dyn Fn(&str, &str, &SourceField<'_>) -> Option<Value> + Send + Sync>;

/// How a term turns its source field into an output value
#[derive(Clone, Default)]
pub enum Formatter {
    /// The source field's display text
    #[default]
    Text,
    /// The source field's stored id
    Id,
    /// A fixed value
    Literal(Value),
    Custom(FormatFn),
}

impl Formatter {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &SourceField<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Formatter::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formatter::Text => f.write_str("Text"),
            Formatter::Id => f.write_str("Id"),
            Formatter::Literal(v) => write!(f, "Literal({})", v),
            Formatter::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func)),
        }
    }
}

/// One filter term
#[derive(Clone, Debug)]
pub enum FilterTerm {
    /// Shorthand for `{field: name}` with the text formatter
    Field(FieldType),
    /// Value taken as-is
    Literal(Value),
    Structured {
        field: Option<FieldType>,
        format: Formatter,
    },
}

impl FilterTerm {
    pub fn field(field_type: impl Into<FieldType>) -> Self {
        FilterTerm::Field(field_type.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        FilterTerm::Literal(value.into())
    }

    /// `{field, format: "id"}`
    pub fn id_of(field_type: impl Into<FieldType>) -> Self {
        FilterTerm::Structured {
            field: Some(field_type.into()),
            format: Formatter::Id,
        }
    }

    pub fn formatted(field_type: impl Into<FieldType>, format: Formatter) -> Self {
        FilterTerm::Structured {
            field: Some(field_type.into()),
            format,
        }
    }

    /// Normalize a raw JSON term.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(name) => FilterTerm::Field(FieldType(name)),
            Value::Object(map) if map.contains_key("format") || is_field_only(&map) => {
                let field = map
                    .get("field")
                    .and_then(Value::as_str)
                    .map(FieldType::from);
                let format = match map.get("format") {
                    None => Formatter::Text,
                    Some(Value::String(s)) if s == "id" => Formatter::Id,
                    Some(other) => Formatter::Literal(other.clone()),
                };
                FilterTerm::Structured { field, format }
            }
            other => FilterTerm::Literal(other),
        }
    }
}

fn is_field_only(map: &serde_json::Map<String, Value>) -> bool {
    map.len() == 1 && map.get("field").map(Value::is_string).unwrap_or(false)
}

/// Ordered set of named filter terms
#[derive(Clone, Debug, Default)]
pub struct FilterSpec {
    terms: Vec<(String, FilterTerm)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        FilterSpec::default()
    }

    /// Builder form of [`FilterSpec::insert`]
    pub fn with(mut self, key: impl Into<String>, term: FilterTerm) -> Self {
        self.insert(key, term);
        self
    }

    /// Insert or replace a term, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, term: FilterTerm) {
        let key = key.into();
        match self.terms.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = term,
            None => self.terms.push((key, term)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FilterTerm> {
        self.terms.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Overlay `other` on top of `self`; `other` wins on key clashes.
    pub fn merge(&mut self, other: &FilterSpec) {
        for (key, term) in &other.terms {
            self.insert(key.clone(), term.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterTerm)> {
        self.terms.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl TryFrom<Value> for FilterSpec {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut spec = FilterSpec::new();
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (key, term) in map {
                    spec.insert(key, FilterTerm::from_value(term));
                }
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(name) => {
                            spec.insert(name.clone(), FilterTerm::Field(FieldType(name)))
                        }
                        other => {
                            return Err(format!("filter list entries must be strings, got {}", other))
                        }
                    }
                }
            }
            other => return Err(format!("filter must be an object or a list, got {}", other)),
        }
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FilterSpec::try_from(value).map_err(serde::de::Error::custom)
    }
}
