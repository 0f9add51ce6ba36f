//! Config registry - behavior descriptors shared by every form
//!
//! Registration happens during setup; propagation only reads. The registry is
//! a constructed object handed to forms, not an ambient global.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::{ComboError, ComboResult, ConfigId, FieldConfig, FieldType};

/// How a field names its behavior at registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigRef {
    Id(ConfigId),
    /// Reverse lookup by logical type
    Type(FieldType),
}

impl From<ConfigId> for ConfigRef {
    fn from(id: ConfigId) -> Self {
        ConfigRef::Id(id)
    }
}

impl From<FieldType> for ConfigRef {
    fn from(field_type: FieldType) -> Self {
        ConfigRef::Type(field_type)
    }
}

/// Registered field configs, keyed by config id
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<ConfigId, Arc<FieldConfig>>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        ConfigRegistry::default()
    }

    /// Store a config. The last writer for an id wins.
    pub fn register(&self, id: ConfigId, config: FieldConfig) -> Arc<FieldConfig> {
        let config = Arc::new(config);
        let previous = self.configs.write().insert(id.clone(), Arc::clone(&config));
        if previous.is_some() {
            tracing::debug!(config = %id, "config re-registered");
        } else {
            tracing::trace!(config = %id, field_type = %config.field_type, "config registered");
        }
        config
    }

    /// Parse a JSON blob, derive its id from the type and the canonical
    /// serialization, and register it.
    pub fn register_json(&self, json: &str) -> ComboResult<ConfigId> {
        let value: Value = serde_json::from_str(json)?;
        let canonical = value.to_string();
        let config = FieldConfig::from_value(value)?;
        let id = ConfigId::derive(&config.field_type, &canonical);
        self.register(id.clone(), config);
        Ok(id)
    }

    /// Validate a config built in code and register it under an id derived
    /// from its type and debug rendering. Closures render as their address,
    /// so configs differing only in a closure get distinct ids.
    pub fn register_config(&self, config: FieldConfig) -> ComboResult<ConfigId> {
        let config = config.validated()?;
        let id = ConfigId::derive(&config.field_type, &format!("{:?}", config));
        self.register(id.clone(), config);
        Ok(id)
    }

    pub fn lookup(&self, id: &ConfigId) -> ComboResult<Arc<FieldConfig>> {
        self.configs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ComboError::ConfigNotFound(id.clone()))
    }

    /// Id of the single config registered for a type. Several configs sharing
    /// one type are rejected instead of picking one.
    pub fn resolve_id_for_type(&self, field_type: &FieldType) -> ComboResult<ConfigId> {
        let configs = self.configs.read();
        let mut candidates: Vec<ConfigId> = configs
            .iter()
            .filter(|(_, config)| &config.field_type == field_type)
            .map(|(id, _)| id.clone())
            .collect();

        match candidates.len() {
            0 => Err(ComboError::TypeNotFound(field_type.clone())),
            1 => Ok(candidates.remove(0)),
            _ => {
                candidates.sort();
                Err(ComboError::AmbiguousType {
                    field_type: field_type.clone(),
                    candidates,
                })
            }
        }
    }

    pub fn resolve(&self, config_ref: &ConfigRef) -> ComboResult<(ConfigId, Arc<FieldConfig>)> {
        let id = match config_ref {
            ConfigRef::Id(id) => id.clone(),
            ConfigRef::Type(field_type) => self.resolve_id_for_type(field_type)?,
        };
        let config = self.lookup(&id)?;
        Ok((id, config))
    }

    pub fn contains(&self, id: &ConfigId) -> bool {
        self.configs.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}
