//! Raw value resolution and remote lookups
//!
//! A raw input (an id, or separated ids) becomes records in this order:
//! local table, single-use display hint, remote lookup, and finally the raw
//! value as its own text.

use std::fmt;

use combo_core::{ComboResult, FieldType, FieldValue, Record, WidgetHandle};
use combo_transport::{LookupFuture, RemoteRecord};

use crate::ComboField;

/// How a raw input will be turned into a value
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Ready(FieldValue),
    /// Needs a remote lookup for these ids
    Remote(Vec<String>),
}

/// Split raw input into ids, dropping empty segments.
pub fn split_raw(raw: &str, multiple: bool, separator: char) -> Vec<String> {
    if multiple {
        raw.split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else if raw.trim().is_empty() {
        Vec::new()
    } else {
        vec![raw.to_string()]
    }
}

/// Decide how `raw` resolves for `field`. Consumes the field's hint.
pub fn plan(field: &mut ComboField, raw: &str, separator: char) -> Resolution {
    let multiple = field.is_multiple();
    let ids = split_raw(raw, multiple, separator);
    let hint = field.take_hint();
    if ids.is_empty() {
        return Resolution::Ready(FieldValue::empty(multiple));
    }

    let config = field.config();
    let has_id = config.has_id.has_id();

    if let Some(table) = &config.data {
        let records = ids
            .iter()
            .map(|id| match table.iter().find(|r| r.key() == id) {
                Some(record) if has_id => record.clone(),
                Some(record) => Record::text_only(record.text.clone()),
                None => own_text(id, has_id),
            })
            .collect();
        return Resolution::Ready(FieldValue::from_records(records, multiple));
    }

    if has_id {
        if let Some(text) = hint {
            let record = Record::new(ids[0].clone(), text);
            return Resolution::Ready(FieldValue::from_records(vec![record], multiple));
        }
        if !multiple && config.remote.is_some() {
            return Resolution::Remote(ids);
        }
    }

    let records = ids.iter().map(|id| own_text(id, has_id)).collect();
    Resolution::Ready(FieldValue::from_records(records, multiple))
}

/// `{id, text: id}`, or a text-only record for fields without a key
pub fn own_text(id: &str, has_id: bool) -> Record {
    if has_id {
        Record::new(id, id)
    } else {
        Record::text_only(id)
    }
}

/// A remote lookup started for a field
pub struct PendingLookup {
    handle: WidgetHandle,
    field_type: FieldType,
    ticket: u64,
    ids: Vec<String>,
    response: LookupFuture,
}

impl PendingLookup {
    pub(crate) fn new(
        handle: WidgetHandle,
        field_type: FieldType,
        ticket: u64,
        ids: Vec<String>,
        response: LookupFuture,
    ) -> Self {
        PendingLookup {
            handle,
            field_type,
            ticket,
            ids,
            response,
        }
    }

    pub fn handle(&self) -> WidgetHandle {
        self.handle
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Wait for the response. The outcome is applied with
    /// `ComboForm::apply_lookup`.
    pub async fn wait(self) -> LookupOutcome {
        let result = self.response.await;
        LookupOutcome {
            handle: self.handle,
            field_type: self.field_type,
            ticket: self.ticket,
            ids: self.ids,
            result,
        }
    }
}

impl fmt::Debug for PendingLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLookup")
            .field("handle", &self.handle)
            .field("field_type", &self.field_type)
            .field("ticket", &self.ticket)
            .field("ids", &self.ids)
            .finish()
    }
}

/// A finished lookup, not yet applied
#[derive(Debug)]
pub struct LookupOutcome {
    pub handle: WidgetHandle,
    pub field_type: FieldType,
    pub(crate) ticket: u64,
    pub ids: Vec<String>,
    pub result: ComboResult<Vec<RemoteRecord>>,
}
