//! Browser tab platform consumed by the hub.
//!
//! Implementations wrap the host's tab API. Every call may fail with a
//! platform-reported error ([`HubError::Platform`](crate::error::HubError::Platform)).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HubResult;

pub type TabId = i32;

/// Snapshot of a browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl TabInfo {
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            active: false,
        }
    }
}

#[async_trait]
pub trait TabPlatform: Send + Sync {
    /// Currently focused tab of the focused window, if any.
    async fn active_tab(&self) -> HubResult<Option<TabInfo>>;

    /// Look up a tab. Fails if it no longer exists.
    async fn get_tab(&self, tab_id: TabId) -> HubResult<TabInfo>;

    /// Open a new tab at `url`.
    async fn create_tab(&self, url: &str) -> HubResult<TabInfo>;

    /// Bring a tab (and its window) to the front.
    async fn focus_tab(&self, tab_id: TabId) -> HubResult<()>;
}
