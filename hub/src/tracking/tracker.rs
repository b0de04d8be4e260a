//! Lifecycle tracking for tool invocations.
//!
//! Each call moves `initiated -> executing -> completed | failed | timeout`.
//! Finished calls are published on a broadcast channel and dropped from the
//! live table. The table holds at most `capacity` in-flight calls; past that,
//! the oldest call is evicted without being published.

use std::{future::Future, num::NonZeroUsize, sync::Arc};

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::context::{CallContext, CallStatus, ToolCall};
use crate::{
    core::metrics::HubMetrics,
    error::{HubError, HubResult},
    server::ToolResult,
};

pub const DEFAULT_MAX_TRACKED_CALLS: usize = 1000;
const DEFAULT_EVENT_CAPACITY: usize = 256;

pub struct CallTracker {
    /// Insertion order is start order: updates use `peek_mut`, never `get`,
    /// so the LRU end is always the oldest call.
    calls: Mutex<LruCache<String, ToolCall>>,
    events: broadcast::Sender<ToolCall>,
    metrics: Arc<HubMetrics>,
}

impl CallTracker {
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED_CALLS, DEFAULT_EVENT_CAPACITY, metrics)
    }

    pub fn with_capacity(max_calls: usize, event_capacity: usize, metrics: Arc<HubMetrics>) -> Self {
        let capacity = NonZeroUsize::new(max_calls).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            calls: Mutex::new(LruCache::new(capacity)),
            events,
            metrics,
        }
    }

    /// Receive every completed or failed call.
    pub fn subscribe(&self) -> broadcast::Receiver<ToolCall> {
        self.events.subscribe()
    }

    /// Begin tracking a call and return its id.
    pub fn start_call(&self, tool_name: &str, arguments: Value, context: CallContext) -> String {
        let call = ToolCall::new(tool_name, arguments, context);
        let id = call.id.clone();
        self.metrics.record_call_start();

        let evicted = self.calls.lock().push(id.clone(), call);
        if let Some((evicted_id, evicted_call)) = evicted {
            if evicted_id != id {
                debug!(
                    call_id = %evicted_id,
                    tool = %evicted_call.tool_name,
                    "Evicted oldest in-flight call"
                );
                self.metrics.record_call_evicted();
            }
        }
        id
    }

    pub fn update_call_executing(&self, call_id: &str) -> bool {
        match self.calls.lock().peek_mut(call_id) {
            Some(call) => {
                call.status = CallStatus::Executing;
                call.executing_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn complete_call(&self, call_id: &str) -> Option<ToolCall> {
        self.finish(call_id, CallStatus::Completed, None)
    }

    pub fn fail_call(&self, call_id: &str, error: impl Into<String>) -> Option<ToolCall> {
        self.finish(call_id, CallStatus::Failed, Some(error.into()))
    }

    pub fn timeout_call(&self, call_id: &str, error: impl Into<String>) -> Option<ToolCall> {
        self.finish(call_id, CallStatus::Timeout, Some(error.into()))
    }

    fn finish(&self, call_id: &str, status: CallStatus, error: Option<String>) -> Option<ToolCall> {
        let Some(mut call) = self.calls.lock().pop(call_id) else {
            debug!(call_id = %call_id, "Finished call is no longer tracked");
            return None;
        };
        call.finish(status, error);

        let success = status == CallStatus::Completed;
        self.metrics
            .record_call_end(&call.tool_name, success, call.duration_ms.unwrap_or(0));
        if success {
            debug!(tool = %call.tool_name, duration_ms = ?call.duration_ms, "Tool call completed");
        } else {
            warn!(
                tool = %call.tool_name,
                status = ?status,
                error = call.error.as_deref().unwrap_or(""),
                "Tool call failed"
            );
        }

        // No subscribers is fine.
        let _ = self.events.send(call.clone());
        Some(call)
    }

    /// Run `handler` under tracking.
    ///
    /// An `Ok` result flagged `is_error` is recorded as failed and still
    /// returned. Handler errors are recorded and then returned unchanged.
    pub async fn execute_with_tracking<F, Fut>(
        &self,
        tool_name: &str,
        arguments: Value,
        context: CallContext,
        handler: F,
    ) -> HubResult<ToolResult>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = HubResult<ToolResult>>,
    {
        let call_id = self.start_call(tool_name, arguments.clone(), context);
        self.update_call_executing(&call_id);

        match handler(arguments).await {
            Ok(result) => {
                match result.error_message() {
                    Some(message) => self.fail_call(&call_id, message),
                    None => self.complete_call(&call_id),
                };
                Ok(result)
            }
            Err(err) => {
                if matches!(
                    err,
                    HubError::RequestTimeout(_) | HubError::ReopenTimeout { .. }
                ) {
                    self.timeout_call(&call_id, err.to_string());
                } else {
                    self.fail_call(&call_id, err.to_string());
                }
                Err(err)
            }
        }
    }

    pub fn get_call(&self, call_id: &str) -> Option<ToolCall> {
        self.calls.lock().peek(call_id).cloned()
    }

    /// In-flight calls, oldest first.
    pub fn active_calls(&self) -> Vec<ToolCall> {
        self.calls.lock().iter().rev().map(|(_, call)| call.clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tracking::context::ToolSource;

    fn tracker(capacity: usize) -> CallTracker {
        CallTracker::with_capacity(capacity, 16, Arc::new(HubMetrics::new()))
    }

    fn ctx() -> CallContext {
        CallContext::new(ToolSource::Website)
    }

    #[test]
    fn test_lifecycle_publishes_and_evicts_from_live_table() {
        let tracker = tracker(10);
        let mut events = tracker.subscribe();

        let id = tracker.start_call("foo", json!({"a": 1}), ctx());
        assert_eq!(tracker.get_call(&id).unwrap().status, CallStatus::Initiated);

        assert!(tracker.update_call_executing(&id));
        let call = tracker.get_call(&id).unwrap();
        assert_eq!(call.status, CallStatus::Executing);
        assert!(call.executing_at.is_some());

        let done = tracker.complete_call(&id).unwrap();
        assert_eq!(done.status, CallStatus::Completed);
        assert!(done.duration_ms.is_some());
        assert!(tracker.get_call(&id).is_none());
        assert_eq!(tracker.active_count(), 0);

        let published = events.try_recv().unwrap();
        assert_eq!(published.id, id);
        assert_eq!(published.status, CallStatus::Completed);
    }

    #[test]
    fn test_retention_evicts_oldest_without_publishing() {
        let tracker = tracker(DEFAULT_MAX_TRACKED_CALLS);
        let mut events = tracker.subscribe();

        let ids: Vec<String> = (0..=DEFAULT_MAX_TRACKED_CALLS)
            .map(|i| tracker.start_call(&format!("tool-{}", i), Value::Null, ctx()))
            .collect();

        assert_eq!(tracker.active_count(), DEFAULT_MAX_TRACKED_CALLS);
        assert!(tracker.get_call(&ids[0]).is_none());
        assert!(tracker.get_call(&ids[1]).is_some());
        assert!(tracker.get_call(&ids[DEFAULT_MAX_TRACKED_CALLS]).is_some());
        assert!(events.try_recv().is_err());
        assert_eq!(tracker.metrics.snapshot().evicted_calls, 1);
    }

    #[test]
    fn test_updates_do_not_change_eviction_order() {
        let tracker = tracker(2);
        let first = tracker.start_call("a", Value::Null, ctx());
        let second = tracker.start_call("b", Value::Null, ctx());
        tracker.update_call_executing(&first);
        tracker.get_call(&first);

        tracker.start_call("c", Value::Null, ctx());
        assert!(tracker.get_call(&first).is_none());
        assert!(tracker.get_call(&second).is_some());
        let names: Vec<String> = tracker.active_calls().into_iter().map(|c| c.tool_name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_finishing_unknown_call_is_noop() {
        let tracker = tracker(4);
        assert!(tracker.complete_call("missing").is_none());
        assert!(!tracker.update_call_executing("missing"));
    }

    #[tokio::test]
    async fn test_execute_with_tracking_success() {
        let tracker = tracker(4);
        let mut events = tracker.subscribe();

        let result = tracker
            .execute_with_tracking("foo", json!({"q": "x"}), ctx(), |args| async move {
                Ok(ToolResult::text(format!("echo {}", args["q"])))
            })
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(events.try_recv().unwrap().status, CallStatus::Completed);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_with_tracking_error_result_is_failed() {
        let tracker = tracker(4);
        let mut events = tracker.subscribe();

        let result = tracker
            .execute_with_tracking("foo", Value::Null, ctx(), |_| async {
                Ok(ToolResult::error("quota exceeded"))
            })
            .await
            .unwrap();

        assert!(result.is_error);
        let call = events.try_recv().unwrap();
        assert_eq!(call.status, CallStatus::Failed);
        assert_eq!(call.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn test_execute_with_tracking_propagates_errors() {
        let tracker = tracker(4);
        let mut events = tracker.subscribe();

        let result = tracker
            .execute_with_tracking("foo", Value::Null, ctx(), |_| async {
                Err(HubError::ToolExecution("handler blew up".to_string()))
            })
            .await;

        assert!(matches!(result, Err(HubError::ToolExecution(_))));
        let call = events.try_recv().unwrap();
        assert_eq!(call.status, CallStatus::Failed);
        assert_eq!(
            call.error.as_deref(),
            Some("Tool execution failed: handler blew up")
        );
    }

    #[tokio::test]
    async fn test_execute_with_tracking_marks_timeouts() {
        let tracker = tracker(4);
        let mut events = tracker.subscribe();

        let _ = tracker
            .execute_with_tracking("foo", Value::Null, ctx(), |_| async {
                Err(HubError::RequestTimeout(500))
            })
            .await;

        assert_eq!(events.try_recv().unwrap().status, CallStatus::Timeout);
        assert_eq!(tracker.metrics.snapshot().failed_calls, 1);
    }
}
