//! Read-only view over a form's fields

use combo_core::{FieldStates, FieldType, FieldValue};

use crate::ComboField;

/// Borrowed snapshot handed to conditions and filter formatters
#[derive(Clone, Copy)]
pub struct FormView<'a> {
    fields: &'a [ComboField],
}

impl<'a> FormView<'a> {
    pub fn new(fields: &'a [ComboField]) -> Self {
        FormView { fields }
    }

    pub fn field(&self, field_type: &FieldType) -> Option<&'a ComboField> {
        self.fields.iter().find(|f| f.field_type() == field_type)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldStates for FormView<'_> {
    fn has_field(&self, field_type: &FieldType) -> bool {
        self.field(field_type).is_some()
    }

    fn value_of(&self, field_type: &FieldType) -> Option<&FieldValue> {
        self.field(field_type).map(ComboField::value)
    }
}
