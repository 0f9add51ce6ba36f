//! Error types for combo forms

use thiserror::Error;

use crate::{ConfigId, FieldType};

/// Core combo errors
#[derive(Error, Debug)]
pub enum ComboError {
    // Registry errors
    #[error("Config not found: {0}")]
    ConfigNotFound(ConfigId),

    #[error("No config registered for type {0}")]
    TypeNotFound(FieldType),

    #[error("Type {field_type} is shared by configs {candidates:?}")]
    AmbiguousType {
        field_type: FieldType,
        candidates: Vec<ConfigId>,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    // Form errors
    #[error("Form already has a field of type {0}")]
    DuplicateFieldType(FieldType),

    #[error("Field not found: {0}")]
    FieldNotFound(FieldType),

    #[error("Field {0} is waiting for a lookup")]
    FieldBusy(FieldType),

    #[error("Propagation did not settle after {passes} passes (origin: {origin:?})")]
    PropagationLimit {
        passes: usize,
        origin: Option<FieldType>,
    },

    // Lookup errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Lookup channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for ComboError {
    fn from(err: serde_json::Error) -> Self {
        ComboError::InvalidConfig(err.to_string())
    }
}

/// Result type for combo operations
pub type ComboResult<T> = Result<T, ComboError>;
