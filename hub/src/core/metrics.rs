//! Hub metrics for monitoring tool calls, channels and tab reopens.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Metrics for hub operations.
pub struct HubMetrics {
    // Call metrics
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    evicted_calls: AtomicU64,

    // Reopen metrics
    reopens_requested: AtomicU64,
    reopens_succeeded: AtomicU64,
    reopens_failed: AtomicU64,

    // Channel metrics
    channel_errors: AtomicU64,
    active_channels: AtomicU64,

    // Execution metrics
    active_executions: AtomicU64,

    // Per-tool latency tracking, keyed by external tool name
    tool_latencies: DashMap<String, LatencyStats>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            evicted_calls: AtomicU64::new(0),
            reopens_requested: AtomicU64::new(0),
            reopens_succeeded: AtomicU64::new(0),
            reopens_failed: AtomicU64::new(0),
            channel_errors: AtomicU64::new(0),
            active_channels: AtomicU64::new(0),
            active_executions: AtomicU64::new(0),
            tool_latencies: DashMap::new(),
        }
    }

    pub fn record_call_start(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.active_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call_end(&self, tool: &str, success: bool, duration_ms: u64) {
        self.decrement_active_executions();

        if success {
            self.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }

        self.tool_latencies
            .entry(tool.to_string())
            .or_insert_with(LatencyStats::new)
            .record(duration_ms);
    }

    /// A call dropped from the tracker before it finished.
    pub fn record_call_evicted(&self) {
        self.decrement_active_executions();
        self.evicted_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_active_executions(&self) {
        // Saturate: eviction and completion of the same call must not underflow.
        let _ = self
            .active_executions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn record_reopen_requested(&self) {
        self.reopens_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reopen_succeeded(&self) {
        self.reopens_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reopen_failed(&self) {
        self.reopens_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_error(&self) {
        self.channel_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_opened(&self) {
        self.active_channels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_closed(&self) {
        let _ = self
            .active_channels
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            evicted_calls: self.evicted_calls.load(Ordering::Relaxed),
            reopens_requested: self.reopens_requested.load(Ordering::Relaxed),
            reopens_succeeded: self.reopens_succeeded.load(Ordering::Relaxed),
            reopens_failed: self.reopens_failed.load(Ordering::Relaxed),
            channel_errors: self.channel_errors.load(Ordering::Relaxed),
            active_channels: self.active_channels.load(Ordering::Relaxed),
            active_executions: self.active_executions.load(Ordering::Relaxed),
        }
    }

    pub fn tool_latency(&self, tool: &str) -> Option<LatencySnapshot> {
        self.tool_latencies.get(tool).map(|stats| stats.snapshot())
    }

    pub fn all_tool_latencies(&self) -> Vec<(String, LatencySnapshot)> {
        self.tool_latencies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tool latency statistics.
pub struct LatencyStats {
    count: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyStats {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }

    fn record(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total = self.total_ms.load(Ordering::Relaxed);
        let min = self.min_ms.load(Ordering::Relaxed);
        let max = self.max_ms.load(Ordering::Relaxed);

        LatencySnapshot {
            count,
            avg_ms: if count > 0 { total / count } else { 0 },
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub evicted_calls: u64,
    pub reopens_requested: u64,
    pub reopens_succeeded: u64,
    pub reopens_failed: u64,
    pub channel_errors: u64,
    pub active_channels: u64,
    pub active_executions: u64,
}

impl MetricsSnapshot {
    /// Success rate of finished calls as a percentage.
    pub fn success_rate(&self) -> f64 {
        let completed = self.successful_calls + self.failed_calls;
        if completed == 0 {
            100.0
        } else {
            (self.successful_calls as f64 / completed as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    pub count: u64,
    pub avg_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}
