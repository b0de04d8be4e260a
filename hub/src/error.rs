//! Hub error types.
//!
//! Variants follow the failure classes of a tool invocation: catalog
//! resolution, channel transport, tab resurrection, the tool's own handler,
//! and platform lookups.

use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("No tool catalog for {domain}/{data_id}")]
    CatalogNotFound { domain: String, data_id: String },

    #[error("No channel available for {0}")]
    ChannelUnavailable(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Failed to send on channel: {0}")]
    ChannelSend(String),

    #[error("Timed out after {timeout_ms}ms waiting for {url} to reopen")]
    ReopenTimeout { url: String, timeout_ms: u64 },

    #[error("Failed to open tab for {url}: {reason}")]
    TabCreation { url: String, reason: String },

    #[error("Reopen aborted: {0}")]
    ReopenAborted(String),

    #[error("Request timed out after {0}ms")]
    RequestTimeout(u64),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Tool registration failed for '{name}': {reason}")]
    Registration { name: String, reason: String },

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Errors raised while locating or reviving the channel that owns a tool.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            HubError::CatalogNotFound { .. }
                | HubError::ChannelUnavailable(_)
                | HubError::ChannelClosed(_)
                | HubError::ChannelSend(_)
                | HubError::ReopenTimeout { .. }
                | HubError::TabCreation { .. }
                | HubError::ReopenAborted(_)
        )
    }
}

/// Failure shared by every caller waiting on the same tab reopen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReopenError {
    #[error("timed out after {timeout_ms}ms waiting for {url} to reopen")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("failed to open tab for {url}: {reason}")]
    TabCreation { url: String, reason: String },

    #[error("{0}")]
    Aborted(String),
}

impl From<ReopenError> for HubError {
    fn from(err: ReopenError) -> Self {
        match err {
            ReopenError::Timeout { url, timeout_ms } => HubError::ReopenTimeout { url, timeout_ms },
            ReopenError::TabCreation { url, reason } => HubError::TabCreation { url, reason },
            ReopenError::Aborted(reason) => HubError::ReopenAborted(reason),
        }
    }
}
