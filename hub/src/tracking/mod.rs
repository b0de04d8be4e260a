//! Invocation tracking.
//!
//! - [`context`]: call context and tool-call records
//! - [`tracker`]: bounded in-flight table with completion events

pub mod context;
pub mod tracker;

pub use context::{CallContext, CallStatus, SessionId, ToolCall, ToolSource};
pub use tracker::{CallTracker, DEFAULT_MAX_TRACKED_CALLS};
