//! Tool lifecycle hub for a browser extension.
//!
//! Tabs announce tool catalogs over message channels; the hub exposes every
//! tool on one MCP server under a unique name, routes invocations back to
//! the owning tab, keeps cacheable tools of closed tabs callable by
//! reopening their page, and tracks every call.
//!
//! ## Modules
//!
//! - [`core`]: the coordinator ([`TabHub`]), config, metrics, reopens
//! - [`catalog`]: tool descriptors and the domain-keyed registry
//! - [`tracking`]: call records and the in-flight tracker
//! - [`correlation`]: request/response matching over tab channels
//!
//! ## Boundaries
//!
//! - [`server`]: the MCP server tools are registered on
//! - [`platform`]: the browser's tab API
//! - [`channel`]: tab channel messages and ports

// Shared types (used across modules)
pub mod annotations;
pub mod error;
pub mod logging;
pub mod naming;

// Boundaries
pub mod channel;
pub mod platform;
pub mod server;

// Subsystems
pub mod catalog;
pub mod core;
pub mod correlation;
pub mod tracking;

pub use annotations::ToolAnnotations;
pub use catalog::{CatalogEntry, CatalogKey, CatalogRegistry, DataSourceId, ToolDescriptor};
pub use channel::{ChannelId, HubMessage, TabChannel, TabMessage, TabPort};
pub use core::{
    CatalogSummary, ExtensionHandler, HubConfig, HubMetrics, LoggingConfig, MetricsSnapshot,
    TabHub, TabStatus, CAPABILITY_INDEX_TOOL,
};
pub use correlation::RequestCorrelator;
pub use error::{HubError, HubResult, ReopenError};
pub use logging::init_logging;
pub use naming::{domain_from_url, external_tool_name, sanitize_name};
pub use platform::{TabId, TabInfo, TabPlatform};
pub use server::{InvocationMeta, Tool, ToolHandler, ToolRegistration, ToolResult, ToolServer};
pub use tracking::{CallContext, CallStatus, CallTracker, SessionId, ToolCall, ToolSource};
