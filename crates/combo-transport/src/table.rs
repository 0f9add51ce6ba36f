//! In-memory lookup tables
//!
//! Serves lookups from per-url record tables, interpreting the body the way
//! the search endpoints do: `rename` copies source keys to output names,
//! `<name>_like` is a case-insensitive substring match, every other scalar
//! parameter must equal the record's value, and `return` projects the result.

use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use combo_core::{value_to_string, ComboError};

use crate::{LookupFuture, LookupRequest, RemoteLookup, RemoteRecord};

#[derive(Debug, Default)]
pub struct StaticLookup {
    tables: RwLock<HashMap<String, Vec<RemoteRecord>>>,
    failing: RwLock<HashSet<String>>,
    requests: Mutex<Vec<LookupRequest>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        StaticLookup::default()
    }

    /// Serve `records` for `url`
    pub fn with_table(self, url: impl Into<String>, records: Vec<RemoteRecord>) -> Self {
        self.tables.write().insert(url.into(), records);
        self
    }

    /// Parse a JSON array of objects as the table for `url`
    pub fn with_json_table(self, url: impl Into<String>, records: Value) -> Self {
        let records = match records {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.with_table(url, records)
    }

    /// Make every lookup against `url` fail with a transport error
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.write().insert(url.into());
    }

    pub fn recover(&self, url: &str) {
        self.failing.write().remove(url);
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<LookupRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn answer(&self, request: &LookupRequest) -> Result<Vec<RemoteRecord>, ComboError> {
        if self.failing.read().contains(&request.url) {
            return Err(ComboError::Transport(format!("{} unavailable", request.url)));
        }
        let tables = self.tables.read();
        let Some(table) = tables.get(&request.url) else {
            return Err(ComboError::Transport(format!("404 {}", request.url)));
        };

        let rename: Vec<(String, String)> = request
            .param("rename")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(out, src)| src.as_str().map(|s| (out.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let projection: Option<Vec<String>> = request
            .param("return")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(value_to_string).collect());

        let records = table
            .iter()
            .map(|record| {
                let mut record = record.clone();
                for (out, src) in &rename {
                    if let Some(v) = record.get(src).cloned() {
                        record.insert(out.clone(), v);
                    }
                }
                record
            })
            .filter(|record| matches_filters(record, request))
            .map(|record| match &projection {
                Some(fields) => record
                    .into_iter()
                    .filter(|(k, _)| fields.contains(k) || rename.iter().any(|(out, _)| out == k))
                    .collect(),
                None => record,
            })
            .collect();
        Ok(records)
    }
}

fn matches_filters(record: &RemoteRecord, request: &LookupRequest) -> bool {
    request
        .body
        .iter()
        .filter(|(name, _)| name.as_str() != "return" && name.as_str() != "rename")
        .all(|(name, expected)| {
            if expected.is_array() || expected.is_object() {
                return true;
            }
            let Some(expected) = value_to_string(expected) else {
                return true;
            };
            if let Some(field) = name.strip_suffix("_like") {
                let haystack = record
                    .get(field)
                    .or_else(|| record.get("text"))
                    .and_then(value_to_string)
                    .unwrap_or_default();
                return haystack.to_lowercase().contains(&expected.to_lowercase());
            }
            match record.get(name.as_str()).and_then(value_to_string) {
                Some(actual) => actual == expected,
                // Parameters the table does not know about do not filter.
                None => true,
            }
        })
}

impl RemoteLookup for StaticLookup {
    fn lookup(&self, request: LookupRequest) -> LookupFuture {
        self.requests.lock().push(request.clone());
        let result = self.answer(&request);
        tracing::trace!(url = %request.url, ok = result.is_ok(), "static lookup");
        Box::pin(async move { result })
    }
}
