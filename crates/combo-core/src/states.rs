//! Read-only view of the other fields of a form
//!
//! Custom conditions and filter formatters only ever see the form through
//! this trait, so they cannot mutate fields mid-pass.

use crate::{FieldType, FieldValue};

pub trait FieldStates {
    /// Whether a field of this type is registered
    fn has_field(&self, field_type: &FieldType) -> bool;

    /// Current value of the field of this type
    fn value_of(&self, field_type: &FieldType) -> Option<&FieldValue>;

    /// A field is set when its stored id is non-empty. Missing fields are not set.
    fn is_set(&self, field_type: &FieldType) -> bool {
        self.value_of(field_type)
            .map(|value| !value.id().is_empty())
            .unwrap_or(false)
    }

    fn id_of(&self, field_type: &FieldType) -> String {
        self.value_of(field_type).map(FieldValue::id).unwrap_or_default()
    }

    fn text_of(&self, field_type: &FieldType) -> String {
        self.value_of(field_type).map(FieldValue::text).unwrap_or_default()
    }

    /// All listed fields are set. With `skip_missing`, fields absent from the
    /// form count as set.
    fn are_set(&self, types: &[FieldType], skip_missing: bool) -> bool {
        types
            .iter()
            .all(|ty| self.is_set(ty) || (skip_missing && !self.has_field(ty)))
    }
}

/// Source field handed to custom filter formatters
pub struct SourceField<'a> {
    pub field_type: &'a FieldType,
    pub value: &'a FieldValue,
    pub form: &'a dyn FieldStates,
}
