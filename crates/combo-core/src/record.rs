//! Records and field values
//!
//! A record is one selectable option: an id/text pair plus whatever else the
//! remote side returned for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether remote records carry a primary key, and under which name.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Records carry their key in `id`
    #[default]
    Id,
    /// Records carry their key under a custom name
    Named(String),
    /// Records have no key; the text is the value
    None,
}

impl KeyPolicy {
    /// Name of the identifier key, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            KeyPolicy::Id => Some("id"),
            KeyPolicy::Named(name) => Some(name.as_str()),
            KeyPolicy::None => None,
        }
    }

    #[inline]
    pub fn has_id(&self) -> bool {
        !matches!(self, KeyPolicy::None)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum KeyPolicyRepr {
    Flag(bool),
    Named(String),
}

impl Serialize for KeyPolicy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyPolicy::Id => KeyPolicyRepr::Flag(true),
            KeyPolicy::Named(name) => KeyPolicyRepr::Named(name.clone()),
            KeyPolicy::None => KeyPolicyRepr::Flag(false),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyPolicy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match KeyPolicyRepr::deserialize(deserializer)? {
            KeyPolicyRepr::Flag(true) => KeyPolicy::Id,
            KeyPolicyRepr::Flag(false) => KeyPolicy::None,
            KeyPolicyRepr::Named(name) if name == "id" => KeyPolicy::Id,
            KeyPolicyRepr::Named(name) => KeyPolicy::Named(name),
        })
    }
}

/// Render a scalar JSON value the way it would appear in an input element.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// One selectable option
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Map<String, Value>", try_from = "Map<String, Value>")]
pub struct Record {
    /// Primary key; absent for fields without an identifier key
    pub id: Option<String>,
    /// Display text
    pub text: String,
    /// Remaining payload returned with the record
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Record {
            id: Some(id.into()),
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Record of a field without an identifier key
    pub fn text_only(text: impl Into<String>) -> Self {
        Record {
            id: None,
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Interpret a remote record according to the key policy.
    pub fn from_remote(map: &Map<String, Value>, policy: &KeyPolicy) -> Self {
        let id = policy
            .key()
            .and_then(|key| map.get(key))
            .and_then(value_to_string);
        let text = map
            .get("text")
            .and_then(value_to_string)
            .or_else(|| id.clone())
            .unwrap_or_default();
        let attributes = map
            .iter()
            .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "text")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Record {
            id,
            text,
            attributes,
        }
    }

    /// The stored value: the id, or the text when there is no id.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.text)
    }

    /// Look up a payload key; `id` and `text` map to the pair itself.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.clone().map(Value::String),
            "text" => Some(Value::String(self.text.clone())),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// Same as [`Record::get`], rendered as a string.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).as_ref().and_then(value_to_string)
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        let mut map: Map<String, Value> = record.attributes.into_iter().collect();
        if let Some(id) = record.id {
            map.insert("id".to_string(), Value::String(id));
        }
        map.insert("text".to_string(), Value::String(record.text));
        map
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        if !map.contains_key("id") && !map.contains_key("text") {
            return Err("record needs at least one of `id` or `text`".to_string());
        }
        Ok(Record::from_remote(&map, &KeyPolicy::Id))
    }
}

/// Current value of a field
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Single(Option<Record>),
    Multiple(Vec<Record>),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Single(None)
    }
}

impl FieldValue {
    /// Empty pair or empty sequence
    pub fn empty(multiple: bool) -> Self {
        if multiple {
            FieldValue::Multiple(Vec::new())
        } else {
            FieldValue::Single(None)
        }
    }

    pub fn single(record: Record) -> Self {
        FieldValue::Single(Some(record))
    }

    /// Shape records for a single- or multi-valued field. A single-valued
    /// field keeps the first record.
    pub fn from_records(records: Vec<Record>, multiple: bool) -> Self {
        if multiple {
            FieldValue::Multiple(records)
        } else {
            FieldValue::Single(records.into_iter().next())
        }
    }

    #[inline]
    pub fn is_multiple(&self) -> bool {
        matches!(self, FieldValue::Multiple(_))
    }

    pub fn records(&self) -> &[Record] {
        match self {
            FieldValue::Single(Some(record)) => std::slice::from_ref(record),
            FieldValue::Single(None) => &[],
            FieldValue::Multiple(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            FieldValue::Single(record) => record.into_iter().collect(),
            FieldValue::Multiple(records) => records,
        }
    }

    pub fn first(&self) -> Option<&Record> {
        self.records().first()
    }

    /// Stored id(s), comma-joined for multi-valued fields
    pub fn id(&self) -> String {
        self.records()
            .iter()
            .map(Record::key)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Display text(s), comma-joined for multi-valued fields
    pub fn text(&self) -> String {
        self.records()
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.records().iter().all(|r| r.key().is_empty())
    }

    /// Records present in `next` but not in `self`, and the reverse, compared
    /// by key.
    pub fn diff(&self, next: &FieldValue) -> (Vec<Record>, Vec<Record>) {
        let added = next
            .records()
            .iter()
            .filter(|r| !self.records().iter().any(|o| o.key() == r.key()))
            .cloned()
            .collect();
        let removed = self
            .records()
            .iter()
            .filter(|r| !next.records().iter().any(|n| n.key() == r.key()))
            .cloned()
            .collect();
        (added, removed)
    }
}
