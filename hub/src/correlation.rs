//! Request/response correlation over tab channels.
//!
//! Tab channels are plain message streams. [`RequestCorrelator`] tags each
//! outgoing invocation with a fresh request id and parks a oneshot sender
//! until the matching `result` message arrives or the channel goes away.
//!
//! There is no timeout at this layer. Callers that want one wrap
//! [`RequestCorrelator::send_request`] in `tokio::time::timeout`; dropping the
//! future removes its pending entry.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    channel::{ChannelId, HubMessage, TabPort},
    error::{HubError, HubResult},
};

struct PendingRequest {
    channel_id: ChannelId,
    tx: oneshot::Sender<HubResult<Value>>,
}

#[derive(Default)]
pub struct RequestCorrelator {
    pending: DashMap<String, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `tool_name` on the tab behind `port` and wait for its result.
    pub async fn send_request(
        &self,
        port: &TabPort,
        tool_name: &str,
        args: Value,
    ) -> HubResult<Value> {
        if port.is_closed() {
            return Err(HubError::ChannelClosed(port.to_string()));
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                channel_id: port.id(),
                tx,
            },
        );
        let _cleanup = scopeguard::guard(request_id.clone(), |id| {
            self.pending.remove(&id);
        });

        port.send(HubMessage::Invoke {
            request_id: request_id.clone(),
            tool_name: tool_name.to_string(),
            args,
        })?;
        debug!(request_id = %request_id, tool = %tool_name, channel = %port.id(), "Sent invocation");

        rx.await
            .unwrap_or_else(|_| Err(HubError::ChannelClosed(port.to_string())))
    }

    /// Settle the request matching `request_id`. Returns false for unknown or
    /// already settled ids.
    pub fn resolve(&self, request_id: &str, data: Value) -> bool {
        match self.pending.remove(request_id) {
            Some((_, pending)) => {
                // Receiver may be gone if the caller timed out concurrently.
                let _ = pending.tx.send(Ok(data));
                true
            }
            None => {
                debug!(request_id = %request_id, "Result for unknown request");
                false
            }
        }
    }

    /// Reject every outstanding request sent over `channel_id`.
    pub fn reject_channel(&self, channel_id: ChannelId, reason: &str) -> usize {
        let ids: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.value().channel_id == channel_id)
            .map(|entry| entry.key().clone())
            .collect();
        self.reject_ids(ids, reason)
    }

    pub fn reject_all(&self, reason: &str) -> usize {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        self.reject_ids(ids, reason)
    }

    fn reject_ids(&self, ids: Vec<String>, reason: &str) -> usize {
        let mut rejected = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending
                    .tx
                    .send(Err(HubError::ChannelClosed(reason.to_string())));
                rejected += 1;
            }
        }
        rejected
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
