//! Hub coordination: configuration, metrics, active-tab tracking, tab
//! reopens and the coordinator itself.

pub mod active_tab;
pub mod config;
pub mod hub;
pub mod metrics;
pub mod reopen;

pub use active_tab::{describe_tool, ActiveTabTracker, TabStatus};
pub use config::{ConfigValidationError, HubConfig, LoggingConfig};
pub use hub::{CatalogSummary, ExtensionHandler, TabHub, CAPABILITY_INDEX_TOOL};
pub use metrics::{HubMetrics, LatencySnapshot, MetricsSnapshot};
pub use reopen::{PendingReopens, ReopenOutcome, ReopenTicket};
