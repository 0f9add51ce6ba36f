//! In-process request/response channel
//!
//! Each lookup travels as a `LookupCall` over an mpsc channel and carries a
//! oneshot sender for its single response. A responder either drains the
//! receiver itself or is spawned with [`ChannelLookup::spawn`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use combo_core::{ComboError, ComboResult};

use crate::{LookupFuture, LookupRequest, RemoteLookup, RemoteRecord};

/// A request waiting for its response
#[derive(Debug)]
pub struct LookupCall {
    pub request: LookupRequest,
    reply: oneshot::Sender<ComboResult<Vec<RemoteRecord>>>,
}

impl LookupCall {
    /// Deliver the response. A caller that went away is not an error.
    pub fn respond(self, result: ComboResult<Vec<RemoteRecord>>) {
        if self.reply.send(result).is_err() {
            tracing::debug!(url = %self.request.url, "lookup caller dropped before response");
        }
    }
}

/// Call receiver channel
pub type CallReceiver = mpsc::Receiver<LookupCall>;

/// Remote lookup backed by a request/response channel
#[derive(Clone, Debug)]
pub struct ChannelLookup {
    calls: mpsc::Sender<LookupCall>,
}

impl ChannelLookup {
    /// Create the lookup and the receiver the responder reads from
    pub fn channel(buffer_size: usize) -> (Self, CallReceiver) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (ChannelLookup { calls: tx }, rx)
    }

    /// Start a background responder that answers every call with `handler`
    pub fn spawn<F, Fut>(buffer_size: usize, handler: F) -> Self
    where
        F: Fn(LookupRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComboResult<Vec<RemoteRecord>>> + Send + 'static,
    {
        let (lookup, mut rx) = Self::channel(buffer_size);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let result = handler(call.request.clone()).await;
                    if let Err(e) = &result {
                        tracing::warn!(url = %call.request.url, "lookup failed: {}", e);
                    }
                    call.respond(result);
                });
            }
            tracing::debug!("lookup responder stopped");
        });

        lookup
    }
}

impl RemoteLookup for ChannelLookup {
    fn lookup(&self, request: LookupRequest) -> LookupFuture {
        let calls = self.calls.clone();
        Box::pin(async move {
            let (reply, response) = oneshot::channel();
            calls
                .send(LookupCall { request, reply })
                .await
                .map_err(|_| ComboError::ChannelClosed)?;
            response.await.map_err(|_| ComboError::ChannelClosed)?
        })
    }
}
