//! Remote lookup contract

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use combo_core::{ComboResult, Record};

/// Lookup requests are always POSTed
pub const LOOKUP_METHOD: &str = "POST";

/// Flat filter-parameter body
pub type QueryParams = BTreeMap<String, Value>;

/// One record of a lookup response
pub type RemoteRecord = Map<String, Value>;

/// Single-result lookup in flight
pub type LookupFuture = Pin<Box<dyn Future<Output = ComboResult<Vec<RemoteRecord>>> + Send + 'static>>;

/// Remote search / id resolution request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LookupRequest {
    pub url: String,
    pub body: QueryParams,
}

impl LookupRequest {
    pub fn new(url: impl Into<String>, body: QueryParams) -> Self {
        LookupRequest {
            url: url.into(),
            body,
        }
    }

    pub fn method(&self) -> &'static str {
        LOOKUP_METHOD
    }

    /// Body parameter by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Wire form of the body
    pub fn body_json(&self) -> ComboResult<String> {
        Ok(serde_json::to_string(&self.body)?)
    }
}

/// Capability the engine needs from the option-search transport.
pub trait RemoteLookup: Send + Sync {
    fn lookup(&self, request: LookupRequest) -> LookupFuture;
}

impl<T: RemoteLookup + ?Sized> RemoteLookup for Arc<T> {
    fn lookup(&self, request: LookupRequest) -> LookupFuture {
        (**self).lookup(request)
    }
}

/// Lookup for forms that never reach a remote endpoint
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLookup;

impl RemoteLookup for NoLookup {
    fn lookup(&self, request: LookupRequest) -> LookupFuture {
        Box::pin(async move {
            Err(combo_core::ComboError::Transport(format!(
                "no lookup configured for {}",
                request.url
            )))
        })
    }
}

/// Pick the text for each id out of a response, matching records on `key`;
/// ids without a match keep the id as text.
pub fn match_response(ids: &[String], response: &[RemoteRecord], key: &str) -> Vec<Record> {
    ids.iter()
        .map(|id| {
            let text = response
                .iter()
                .find(|r| r.get(key).and_then(combo_core::value_to_string).as_deref() == Some(id))
                .and_then(|r| r.get("text").and_then(combo_core::value_to_string))
                .unwrap_or_else(|| id.clone());
            Record::new(id.clone(), text)
        })
        .collect()
}
