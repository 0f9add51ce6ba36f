//! Field behavior configuration
//!
//! Configs arrive as JSON blobs generated server-side. Every struct here
//! rejects unknown keys, so a typo in a property name fails at load time
//! instead of being silently ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{ComboError, ComboResult, FieldStates, FieldType, FilterSpec, KeyPolicy, Record};

pub type ConditionFn = Arc<dyn Fn(&dyn FieldStates) -> bool + Send + Sync>;

/// Predicate over the other fields of a form
#[derive(Clone)]
pub enum Condition {
    /// Holds when every listed field is set
    Fields(Vec<FieldType>),
    Custom(ConditionFn),
}

impl Condition {
    pub fn fields<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldType>,
    {
        Condition::Fields(types.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&dyn FieldStates) -> bool + Send + Sync + 'static,
    {
        Condition::Custom(Arc::new(f))
    }

    /// Whether the condition names this type literally
    pub fn lists(&self, field_type: &FieldType) -> bool {
        match self {
            Condition::Fields(types) => types.contains(field_type),
            Condition::Custom(_) => false,
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Fields(types) => f.debug_tuple("Fields").field(types).finish(),
            Condition::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionRepr {
    One(FieldType),
    Many(Vec<FieldType>),
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ConditionRepr::deserialize(deserializer)? {
            ConditionRepr::One(ty) => Condition::Fields(vec![ty]),
            ConditionRepr::Many(types) => Condition::Fields(types),
        })
    }
}

/// Which keys of the origin's selected record feed the target
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AffectKeys {
    #[serde(default)]
    pub id: Option<String>,
    pub value: String,
}

pub type AffectFn = Arc<dyn Fn(&FieldConfig) -> AffectKeys + Send + Sync>;

/// Value propagation rule towards one target field
#[derive(Clone)]
pub enum AffectRule {
    /// `v` reads `{v}_{target key}` as id and `v` as text
    Convention(String),
    Keys(AffectKeys),
    Custom(AffectFn),
}

impl AffectRule {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&FieldConfig) -> AffectKeys + Send + Sync + 'static,
    {
        AffectRule::Custom(Arc::new(f))
    }

    /// Resolve the keys to read for a target with the given key policy.
    pub fn keys(&self, origin: &FieldConfig, target_policy: &KeyPolicy) -> AffectKeys {
        match self {
            AffectRule::Convention(prefix) => AffectKeys {
                id: target_policy.key().map(|key| format!("{}_{}", prefix, key)),
                value: prefix.clone(),
            },
            AffectRule::Keys(keys) => keys.clone(),
            AffectRule::Custom(f) => f(origin),
        }
    }
}

impl fmt::Debug for AffectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffectRule::Convention(prefix) => f.debug_tuple("Convention").field(prefix).finish(),
            AffectRule::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            AffectRule::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AffectRuleRepr {
    Convention(String),
    Keys(AffectKeys),
}

impl<'de> Deserialize<'de> for AffectRule {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match AffectRuleRepr::deserialize(deserializer)? {
            AffectRuleRepr::Convention(prefix) => AffectRule::Convention(prefix),
            AffectRuleRepr::Keys(keys) => AffectRule::Keys(keys),
        })
    }
}

/// Remote search/lookup endpoint description
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RemoteQuery {
    pub url: String,
    /// Fields the endpoint should project
    #[serde(rename = "return", default)]
    pub return_fields: Vec<String>,
    /// Output name -> source name
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Static filter terms
    #[serde(default)]
    pub filter: FilterSpec,
    /// Search term parameter, `<name>_like` when absent
    #[serde(default)]
    pub primary_filter: Option<String>,
}

impl RemoteQuery {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteQuery {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_return<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rename(mut self, output: impl Into<String>, source: impl Into<String>) -> Self {
        self.rename.insert(output.into(), source.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_primary_filter(mut self, name: impl Into<String>) -> Self {
        self.primary_filter = Some(name.into());
        self
    }

    pub fn return_value(&self) -> Value {
        Value::from(self.return_fields.clone())
    }

    pub fn rename_value(&self) -> Value {
        Value::Object(
            self.rename
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Behavior descriptor of one field kind
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FieldConfig {
    /// Representative attribute name
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub has_id: KeyPolicy,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub active_when: Option<Condition>,
    #[serde(default)]
    pub clear_when: Option<Condition>,
    #[serde(default)]
    pub affects: BTreeMap<FieldType, AffectRule>,
    #[serde(default)]
    pub remote: Option<RemoteQuery>,
    /// Local lookup table
    #[serde(default)]
    pub data: Option<Vec<Record>>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        FieldConfig {
            name: name.into(),
            field_type: field_type.into(),
            has_id: KeyPolicy::Id,
            multiple: false,
            active_when: None,
            clear_when: None,
            affects: BTreeMap::new(),
            remote: None,
            data: None,
        }
    }

    pub fn from_json(json: &str) -> ComboResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        FieldConfig::from_value(value)
    }

    pub fn from_value(value: Value) -> ComboResult<Self> {
        let config: FieldConfig = serde_json::from_value(value)?;
        config.validated()
    }

    /// Check required properties and fill the remote defaults
    /// (`return: ["id"]`, `rename: {text: name}`).
    pub fn validated(mut self) -> ComboResult<Self> {
        if self.field_type.as_str().is_empty() {
            return Err(ComboError::InvalidConfig(format!(
                "config `{}` has an empty type",
                self.name
            )));
        }
        if self.affects.contains_key(&self.field_type) {
            return Err(ComboError::InvalidConfig(format!(
                "type {} affects itself",
                self.field_type
            )));
        }
        if let Some(remote) = self.remote.as_mut() {
            if remote.url.is_empty() {
                return Err(ComboError::InvalidConfig(format!(
                    "type {} has a remote query without url",
                    self.field_type
                )));
            }
            if remote.return_fields.is_empty() {
                remote.return_fields = vec!["id".to_string()];
            }
            if remote.rename.is_empty() {
                remote.rename.insert("text".to_string(), self.name.clone());
            }
        }
        Ok(self)
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.has_id = policy;
        self
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn with_active_when(mut self, condition: Condition) -> Self {
        self.active_when = Some(condition);
        self
    }

    pub fn with_clear_when(mut self, condition: Condition) -> Self {
        self.clear_when = Some(condition);
        self
    }

    pub fn with_affects(mut self, target: impl Into<FieldType>, rule: AffectRule) -> Self {
        self.affects.insert(target.into(), rule);
        self
    }

    pub fn with_remote(mut self, remote: RemoteQuery) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_data(mut self, data: Vec<Record>) -> Self {
        self.data = Some(data);
        self
    }

    /// Search term parameter name
    pub fn primary_filter(&self, suffix: &str) -> String {
        self.remote
            .as_ref()
            .and_then(|r| r.primary_filter.clone())
            .unwrap_or_else(|| format!("{}{}", self.name, suffix))
    }
}

/// Per-field registration overrides
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FieldOptions {
    #[serde(default)]
    pub multiple: Option<bool>,
    #[serde(default)]
    pub data: Option<Vec<Record>>,
    /// Merged on top of the config's static filter
    #[serde(default)]
    pub filter: Option<FilterSpec>,
    /// Raw initial input: an id, or separated ids for multi-valued fields
    #[serde(default)]
    pub value: Option<String>,
    /// Pre-rendered display text for the initial value (single use)
    #[serde(default)]
    pub init_text: Option<String>,
}

impl FieldOptions {
    pub fn new() -> Self {
        FieldOptions::default()
    }

    pub fn from_json(json: &str) -> ComboResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_value(mut self, raw: impl Into<String>) -> Self {
        self.value = Some(raw.into());
        self
    }

    pub fn with_init_text(mut self, text: impl Into<String>) -> Self {
        self.init_text = Some(text.into());
        self
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    pub fn with_data(mut self, data: Vec<Record>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    fn overrides_config(&self) -> bool {
        self.multiple.is_some() || self.data.is_some() || self.filter.is_some()
    }

    /// Effective config for one field. The shared config is reused untouched
    /// when nothing is overridden.
    pub fn apply(&self, config: &Arc<FieldConfig>) -> ComboResult<Arc<FieldConfig>> {
        if !self.overrides_config() {
            return Ok(Arc::clone(config));
        }

        let mut merged = FieldConfig::clone(config);
        if let Some(multiple) = self.multiple {
            merged.multiple = multiple;
        }
        if let Some(data) = &self.data {
            merged.data = Some(data.clone());
        }
        if let Some(filter) = &self.filter {
            let Some(remote) = merged.remote.as_mut() else {
                return Err(ComboError::InvalidConfig(format!(
                    "filter override for type {} without a remote query",
                    merged.field_type
                )));
            };
            remote.filter.merge(filter);
        }
        Ok(Arc::new(merged))
    }
}

/// Engine configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Ceiling on update passes for one change
    pub max_passes: usize,
    /// Separator of raw multi-valued input
    pub multiple_separator: char,
    /// Appended to the field name to form the default search parameter
    pub primary_filter_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_passes: 32,
            multiple_separator: ',',
            primary_filter_suffix: "_like".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> ComboResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.max_passes == 0 {
            return Err(ComboError::InvalidConfig("maxPasses must be positive".to_string()));
        }
        Ok(config)
    }
}
