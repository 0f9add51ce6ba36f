//! Filter parameter building
//!
//! Turns a field's declarative filter into the flat parameter body of a
//! remote search, reading source values from the rest of the form.

use serde_json::Value;

use combo_core::{
    ComboError, ComboResult, FieldStates, FilterSpec, FilterTerm, Formatter, SourceField,
};
use combo_transport::{LookupRequest, QueryParams};

use crate::ComboField;

pub struct FilterBuilder;

impl FilterBuilder {
    /// Build the parameter body for `field`.
    ///
    /// The configured filter is overlaid with `extra` (extra wins), then
    /// `return` and `rename` are injected unless a term already provides
    /// them. Terms whose source field is missing or empty are omitted.
    pub fn build(field: &ComboField, form: &dyn FieldStates, extra: &FilterSpec) -> QueryParams {
        let remote = field.config().remote.as_ref();

        let mut terms = remote.map(|r| r.filter.clone()).unwrap_or_default();
        terms.merge(extra);

        let mut params = QueryParams::new();
        if let Some(remote) = remote {
            if !terms.contains_key("return") {
                params.insert("return".to_string(), remote.return_value());
            }
            if !terms.contains_key("rename") {
                params.insert("rename".to_string(), remote.rename_value());
            }
        }

        for (key, term) in terms.iter() {
            match Self::evaluate(term, form) {
                Some(value) => {
                    params.insert(key.to_string(), value);
                }
                None => {
                    tracing::trace!(field_type = %field.field_type(), key, "filter term omitted");
                }
            }
        }
        params
    }

    /// Resolve one term against the form
    pub fn evaluate(term: &FilterTerm, form: &dyn FieldStates) -> Option<Value> {
        let (source, format) = match term {
            FilterTerm::Literal(value) => return Some(value.clone()),
            FilterTerm::Field(source) => (Some(source), &Formatter::Text),
            FilterTerm::Structured { field, format } => (field.as_ref(), format),
        };

        let Some(source) = source else {
            return match format {
                Formatter::Literal(value) => Some(value.clone()),
                _ => None,
            };
        };

        let value = form.value_of(source)?;
        if value.is_empty() {
            return None;
        }
        let id = value.id();
        let text = value.text();

        match format {
            Formatter::Id => Some(Value::String(id)),
            Formatter::Text | Formatter::Literal(_) => Some(Value::String(text)),
            Formatter::Custom(f) => f(
                id.as_str(),
                text.as_str(),
                &SourceField {
                    field_type: source,
                    value,
                    form,
                },
            ),
        }
    }

    /// Request resolving a raw id to its record
    pub fn lookup_request(
        field: &ComboField,
        form: &dyn FieldStates,
        raw_id: &str,
    ) -> ComboResult<LookupRequest> {
        let remote = Self::remote_url(field)?;
        let key = field.key_policy().key().unwrap_or("id");
        let extra = FilterSpec::new().with(key, FilterTerm::literal(raw_id));
        Ok(LookupRequest::new(remote, Self::build(field, form, &extra)))
    }

    /// Request searching for `term` through the primary filter
    pub fn search_request(
        field: &ComboField,
        form: &dyn FieldStates,
        term: &str,
        suffix: &str,
    ) -> ComboResult<LookupRequest> {
        let remote = Self::remote_url(field)?;
        let extra = FilterSpec::new().with(field.config().primary_filter(suffix), FilterTerm::literal(term));
        Ok(LookupRequest::new(remote, Self::build(field, form, &extra)))
    }

    fn remote_url(field: &ComboField) -> ComboResult<String> {
        field
            .config()
            .remote
            .as_ref()
            .map(|r| r.url.clone())
            .ok_or_else(|| {
                ComboError::InvalidConfig(format!("type {} has no remote query", field.field_type()))
            })
    }
}
